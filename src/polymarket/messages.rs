//! Polymarket API response types
//!
//! Gamma encodes several list fields as JSON strings (`"[\"Yes\", \"No\"]"`)
//! and numbers as either strings or numbers; the helper types here accept
//! both shapes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// Loosely-typed field helpers
// ============================================================================

/// A list delivered either as a JSON array or as a JSON-encoded string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EncodedList {
    List(Vec<serde_json::Value>),
    Encoded(String),
}

impl EncodedList {
    /// Items as strings; undecodable payloads yield an empty list
    pub fn values(&self) -> Vec<String> {
        let items = match self {
            EncodedList::List(items) => items.clone(),
            EncodedList::Encoded(text) => {
                serde_json::from_str::<Vec<serde_json::Value>>(text).unwrap_or_default()
            }
        };
        items.iter().map(value_to_label).collect()
    }
}

/// Tag objects carry a `label`; bare strings are taken as-is
fn value_to_label(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(map) => map
            .get("label")
            .and_then(|l| l.as_str())
            .unwrap_or_default()
            .to_string(),
        other => other.to_string(),
    }
}

/// Number delivered as a JSON number or string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberOrString {
    Number(f64),
    Text(String),
}

impl NumberOrString {
    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            NumberOrString::Number(n) => Decimal::from_str(&n.to_string()).ok(),
            NumberOrString::Text(s) => Decimal::from_str(s.trim()).ok(),
        }
    }
}

// ============================================================================
// CLOB API Response Types
// ============================================================================

/// Price level in an order book response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: String,
    pub size: String,
}

/// Response from GET /book
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookResponse {
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub asset_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub bids: Vec<BookLevel>,
    #[serde(default)]
    pub asks: Vec<BookLevel>,
}

impl OrderBookResponse {
    /// Highest bid price; unparsable levels are ignored
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids
            .iter()
            .filter_map(|level| Decimal::from_str(level.price.trim()).ok())
            .max()
    }
}

// ============================================================================
// Gamma API Response Types (Market Discovery)
// ============================================================================

/// Market from Gamma API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GammaMarket {
    pub id: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub condition_id: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub volume: Option<NumberOrString>,
    #[serde(default)]
    pub volume_num: Option<NumberOrString>,
    #[serde(default)]
    pub outcomes: Option<EncodedList>,
    #[serde(default)]
    pub outcome_prices: Option<EncodedList>,
    #[serde(default)]
    pub clob_token_ids: Option<EncodedList>,
    #[serde(default)]
    pub tags: Option<EncodedList>,
    #[serde(default)]
    pub group_item_title: Option<String>,
    #[serde(default)]
    pub winning_outcome: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub closed: Option<bool>,
}

impl GammaMarket {
    pub fn outcomes(&self) -> Vec<String> {
        self.outcomes.as_ref().map(|l| l.values()).unwrap_or_default()
    }

    pub fn outcome_prices(&self) -> Vec<String> {
        self.outcome_prices
            .as_ref()
            .map(|l| l.values())
            .unwrap_or_default()
    }

    pub fn token_ids(&self) -> Vec<String> {
        self.clob_token_ids
            .as_ref()
            .map(|l| l.values())
            .unwrap_or_default()
    }

    pub fn tags(&self) -> Vec<String> {
        self.tags
            .as_ref()
            .map(|l| l.values())
            .unwrap_or_default()
            .into_iter()
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// `volumeNum` when present, else `volume`, else zero
    pub fn volume(&self) -> Decimal {
        self.volume_num
            .as_ref()
            .and_then(|v| v.to_decimal())
            .or_else(|| self.volume.as_ref().and_then(|v| v.to_decimal()))
            .unwrap_or(Decimal::ZERO)
    }

    /// First tag label, then the group title, then "other"
    pub fn category(&self) -> String {
        self.tags()
            .into_iter()
            .next()
            .or_else(|| self.group_item_title.clone().filter(|g| !g.is_empty()))
            .unwrap_or_else(|| "other".to_string())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.unwrap_or(false)
    }

    /// Winning outcome label of a closed market
    ///
    /// Falls back to the outcome whose final price is above 0.99 when the
    /// API does not name a winner.
    pub fn winning_outcome(&self) -> Option<String> {
        if let Some(winner) = self.winning_outcome.as_ref().filter(|w| !w.is_empty()) {
            return Some(winner.clone());
        }
        let outcomes = self.outcomes();
        let prices = self.outcome_prices();
        if outcomes.len() != 2 || prices.len() != 2 {
            return None;
        }
        let threshold = Decimal::new(99, 2);
        outcomes
            .into_iter()
            .zip(prices.iter())
            .find(|(_, price)| {
                Decimal::from_str(price.trim())
                    .map(|p| p > threshold)
                    .unwrap_or(false)
            })
            .map(|(outcome, _)| outcome)
    }
}

/// Gamma /markets returns a bare array; older deployments wrap it
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GammaMarketsPayload {
    List(Vec<GammaMarket>),
    Wrapped {
        #[serde(default)]
        data: Option<Vec<GammaMarket>>,
        #[serde(default)]
        markets: Option<Vec<GammaMarket>>,
    },
}

impl GammaMarketsPayload {
    pub fn into_markets(self) -> Vec<GammaMarket> {
        match self {
            GammaMarketsPayload::List(markets) => markets,
            GammaMarketsPayload::Wrapped { data, markets } => data.or(markets).unwrap_or_default(),
        }
    }
}
