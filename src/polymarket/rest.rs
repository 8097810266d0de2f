//! REST API client for the Polymarket CLOB and Gamma APIs

use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

use super::messages::*;
use crate::common::errors::{EngineError, Result};
use crate::config::types::FeedConfig;

/// Read-only REST client for market discovery and prices
#[derive(Debug, Clone)]
pub struct PolymarketRestClient {
    /// HTTP client
    client: Client,
    /// Base URL for the CLOB API
    base_url: String,
    /// Base URL for the Gamma API
    gamma_url: String,
}

impl PolymarketRestClient {
    /// Create a new REST client
    pub fn new(base_url: &str, gamma_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, gamma_url, Duration::from_secs(30))
    }

    /// Create a new REST client with custom timeout
    pub fn with_timeout(base_url: &str, gamma_url: &str, timeout: Duration) -> Result<Self> {
        url::Url::parse(base_url)?;
        url::Url::parse(gamma_url)?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            gamma_url: gamma_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &FeedConfig) -> Result<Self> {
        Self::with_timeout(
            &config.clob_url,
            &config.gamma_url,
            Duration::from_secs(config.request_timeout_seconds),
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, api: &str) -> Result<T> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::InvalidResponse(format!(
                "{} returned status {}: {}",
                api, status, body
            )));
        }

        Ok(response.json().await?)
    }

    // ========================================================================
    // CLOB Endpoints
    // ========================================================================

    /// Get order book for a token
    #[instrument(skip(self))]
    pub async fn get_order_book(&self, token_id: &str) -> Result<OrderBookResponse> {
        let url = format!("{}/book?token_id={}", self.base_url, token_id);
        debug!("Fetching order book from: {}", url);
        self.get_json(&url, "CLOB API").await
    }

    /// Best bid for a token, `None` when the bid side is empty
    #[instrument(skip(self))]
    pub async fn get_best_bid(&self, token_id: &str) -> Result<Option<Decimal>> {
        Ok(self.get_order_book(token_id).await?.best_bid())
    }

    // ========================================================================
    // Gamma API Endpoints (Market Discovery)
    // ========================================================================

    /// One page of active, unclosed markets
    #[instrument(skip(self))]
    pub async fn get_active_markets(&self, limit: u32, offset: u32) -> Result<Vec<GammaMarket>> {
        let url = format!(
            "{}/markets?closed=false&active=true&limit={}&offset={}",
            self.gamma_url, limit, offset
        );
        debug!("Fetching markets from Gamma API: {}", url);
        let payload: GammaMarketsPayload = self.get_json(&url, "Gamma API").await?;
        Ok(payload.into_markets())
    }

    /// Single market by Gamma id, used to detect resolution
    #[instrument(skip(self))]
    pub async fn get_market(&self, market_id: &str) -> Result<GammaMarket> {
        let url = format!("{}/markets/{}", self.gamma_url, market_id);
        debug!("Fetching market from Gamma API: {}", url);
        self.get_json(&url, "Gamma API").await
    }
}
