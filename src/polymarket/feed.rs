//! Polling snapshot feed over the Gamma and CLOB APIs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

use super::messages::GammaMarket;
use super::rest::PolymarketRestClient;
use crate::common::errors::Result;
use crate::common::traits::SnapshotSource;
use crate::common::types::{parse_timestamp, MarketId, Resolution, Snapshot};
use crate::config::types::FeedConfig;

/// Discovered binary market, keyed by its YES token id
#[derive(Debug, Clone, PartialEq)]
pub struct MarketInfo {
    /// Gamma market id, used to re-fetch the market
    pub gamma_id: String,
    /// YES token id; doubles as the engine's market id
    pub token_id: MarketId,
    pub question: String,
    pub category: String,
    pub volume: Decimal,
    pub end_date: DateTime<Utc>,
}

/// True when the question or any tag contains a blacklisted keyword
pub fn is_blacklisted(question: &str, tags: &[String], keywords: &[String]) -> bool {
    let combined = format!("{} {}", question, tags.join(" ")).to_lowercase();
    keywords
        .iter()
        .any(|kw| !kw.is_empty() && combined.contains(&kw.to_lowercase()))
}

/// Keep tradeable binary markets
///
/// A market qualifies when it has exactly two outcomes one of which is
/// "Yes", enough volume, is not closed, is not blacklisted, and names its
/// CLOB tokens (the first is the YES token) and an end date.
pub fn filter_markets(markets: &[GammaMarket], config: &FeedConfig) -> Vec<MarketInfo> {
    markets
        .iter()
        .filter_map(|market| to_market_info(market, config))
        .collect()
}

fn to_market_info(market: &GammaMarket, config: &FeedConfig) -> Option<MarketInfo> {
    let outcomes = market.outcomes();
    if outcomes.len() != 2 || !outcomes.iter().any(|o| o.eq_ignore_ascii_case("yes")) {
        return None;
    }
    let volume = market.volume();
    if volume < config.min_market_volume || market.is_closed() {
        return None;
    }
    if is_blacklisted(&market.question, &market.tags(), &config.blacklist_keywords) {
        return None;
    }
    let token_id = market.token_ids().into_iter().next()?;
    let end_date = market.end_date.as_deref().and_then(parse_timestamp)?;

    Some(MarketInfo {
        gamma_id: market.id.clone(),
        token_id,
        question: market.question.clone(),
        category: market.category(),
        volume,
        end_date,
    })
}

/// Polymarket-backed [`SnapshotSource`]
///
/// Each poll scans up to `max_pages` of active markets, reads the best bid
/// of every qualifying YES token, and re-fetches tracked markets that left
/// the active listing so their resolution is observed.
pub struct SnapshotFeed {
    client: PolymarketRestClient,
    config: FeedConfig,
    /// Every market seen by discovery, by token id
    known: BTreeMap<MarketId, MarketInfo>,
}

impl SnapshotFeed {
    pub fn new(client: PolymarketRestClient, config: FeedConfig) -> Self {
        Self {
            client,
            config,
            known: BTreeMap::new(),
        }
    }

    pub fn known_markets(&self) -> usize {
        self.known.len()
    }

    async fn discover(&mut self) -> Vec<MarketInfo> {
        let mut discovered = Vec::new();
        for page in 0..self.config.max_pages {
            let offset = page * self.config.page_size;
            let batch = match self
                .client
                .get_active_markets(self.config.page_size, offset)
                .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(offset, error = %e, "Gamma page fetch failed");
                    break;
                }
            };
            if batch.is_empty() {
                break;
            }
            discovered.extend(filter_markets(&batch, &self.config));
        }

        for info in &discovered {
            self.known.insert(info.token_id.clone(), info.clone());
        }
        info!(markets = discovered.len(), "Scanner found active binary markets");
        discovered
    }

    async fn observe(&self, info: &MarketInfo, now: DateTime<Utc>) -> Option<Snapshot> {
        let price = match self.client.get_best_bid(&info.token_id).await {
            Ok(Some(price)) => price,
            Ok(None) => {
                debug!(market = %info.token_id, "Empty bid side");
                return None;
            }
            Err(e) => {
                warn!(market = %info.token_id, error = %e, "Order book fetch failed");
                return None;
            }
        };
        build_snapshot(info, price, now, Resolution::Unresolved)
    }

    /// Re-check a tracked market that is no longer listed as active
    async fn observe_tracked(&self, info: &MarketInfo, now: DateTime<Utc>) -> Option<Snapshot> {
        let market = match self.client.get_market(&info.gamma_id).await {
            Ok(market) => market,
            Err(e) => {
                warn!(market = %info.token_id, error = %e, "Market refresh failed");
                return None;
            }
        };
        if !market.is_closed() {
            return self.observe(info, now).await;
        }
        let Some(winner) = market.winning_outcome() else {
            debug!(market = %info.token_id, "Closed but outcome not final yet");
            return None;
        };
        let resolution = Resolution::from_outcome_label(&winner);
        let price = resolution.settlement_value().unwrap_or(Decimal::ZERO);
        build_snapshot(info, price, now, resolution)
    }
}

fn build_snapshot(
    info: &MarketInfo,
    price: Decimal,
    now: DateTime<Utc>,
    resolution: Resolution,
) -> Option<Snapshot> {
    match Snapshot::new(
        info.token_id.clone(),
        info.category.clone(),
        price,
        now,
        info.end_date,
        resolution,
    ) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            warn!(market = %info.token_id, error = %e, "Dropping invalid snapshot");
            None
        }
    }
}

#[async_trait]
impl SnapshotSource for SnapshotFeed {
    #[instrument(skip(self, tracked))]
    async fn poll(&mut self, tracked: &[MarketId], now: DateTime<Utc>) -> Result<Vec<Snapshot>> {
        let discovered = self.discover().await;
        let mut snapshots = Vec::with_capacity(discovered.len() + tracked.len());

        for info in &discovered {
            if let Some(snapshot) = self.observe(info, now).await {
                snapshots.push(snapshot);
            }
        }

        for market_id in tracked {
            if discovered.iter().any(|d| &d.token_id == market_id) {
                continue;
            }
            match self.known.get(market_id) {
                Some(info) => {
                    if let Some(snapshot) = self.observe_tracked(info, now).await {
                        snapshots.push(snapshot);
                    }
                }
                None => warn!(market = %market_id, "Tracked market unknown to the feed"),
            }
        }

        debug!(snapshots = snapshots.len(), "Poll complete");
        Ok(snapshots)
    }

    fn source_name(&self) -> &'static str {
        "polymarket"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn market(json: &str) -> GammaMarket {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_blacklist_matches_tags_and_question() {
        let keywords = vec!["tweet".to_string(), "oscar".to_string()];
        assert!(is_blacklisted("Will Elon tweet today?", &[], &keywords));
        assert!(is_blacklisted("Best picture", &["Oscars".to_string()], &keywords));
        assert!(!is_blacklisted("Will BTC close above 70k?", &["Crypto".to_string()], &keywords));
    }

    #[test]
    fn test_filter_rules() {
        let config = FeedConfig::default();
        let markets = vec![
            market(
                r#"{"id": "1", "question": "Will the Celtics win?", "volumeNum": 20000,
                    "outcomes": "[\"Yes\",\"No\"]", "clobTokenIds": "[\"y1\",\"n1\"]",
                    "tags": [{"label": "NBA"}], "endDate": "2024-05-01T00:00:00Z"}"#,
            ),
            // three outcomes
            market(
                r#"{"id": "2", "question": "Who wins?", "volumeNum": 20000,
                    "outcomes": "[\"A\",\"B\",\"C\"]", "clobTokenIds": "[\"a\",\"b\",\"c\"]",
                    "endDate": "2024-05-01T00:00:00Z"}"#,
            ),
            // thin volume
            market(
                r#"{"id": "3", "question": "Will it rain?", "volume": "100",
                    "outcomes": "[\"Yes\",\"No\"]", "clobTokenIds": "[\"y3\",\"n3\"]",
                    "endDate": "2024-05-01T00:00:00Z"}"#,
            ),
            // blacklisted
            market(
                r#"{"id": "4", "question": "Will the court ruling land?", "volumeNum": 90000,
                    "outcomes": "[\"Yes\",\"No\"]", "clobTokenIds": "[\"y4\",\"n4\"]",
                    "endDate": "2024-05-01T00:00:00Z"}"#,
            ),
            // no end date
            market(
                r#"{"id": "5", "question": "Will ETH flip BTC?", "volumeNum": 90000,
                    "outcomes": "[\"Yes\",\"No\"]", "clobTokenIds": "[\"y5\",\"n5\"]"}"#,
            ),
        ];

        let kept = filter_markets(&markets, &config);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].token_id, "y1");
        assert_eq!(kept[0].gamma_id, "1");
        assert_eq!(kept[0].category, "NBA");
        assert_eq!(kept[0].volume, dec!(20000));
    }
}
