//! Unified types shared by the backtest and live paths

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::errors::{EngineError, Result};

/// Market identifier (YES token id on Polymarket)
pub type MarketId = String;

/// Resolution state of a binary market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Unresolved,
    Yes,
    No,
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Resolution::Unresolved)
    }

    /// Settlement value of the YES token, if resolved
    pub fn settlement_value(&self) -> Option<Decimal> {
        match self {
            Resolution::Unresolved => None,
            Resolution::Yes => Some(Decimal::ONE),
            Resolution::No => Some(Decimal::ZERO),
        }
    }

    /// Interpret a winning-outcome label the way Polymarket reports it
    pub fn from_outcome_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "yes" | "y" | "1" | "true" => Resolution::Yes,
            _ => Resolution::No,
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::Unresolved => write!(f, "unresolved"),
            Resolution::Yes => write!(f, "yes"),
            Resolution::No => write!(f, "no"),
        }
    }
}

/// A single validated observation of a tradeable market
///
/// Produced only through [`Snapshot::new`] or `TryFrom<RawSnapshot>`, so the
/// decision core never sees a price outside [0, 1] or an empty market id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub market_id: MarketId,
    /// Lowercased category label
    pub category: String,
    /// Price of the YES outcome token (0.00 to 1.00)
    pub yes_price: Decimal,
    pub observed_at: DateTime<Utc>,
    /// Scheduled resolution time
    pub resolves_at: DateTime<Utc>,
    pub resolution: Resolution,
}

impl Snapshot {
    pub fn new(
        market_id: impl Into<String>,
        category: impl Into<String>,
        yes_price: Decimal,
        observed_at: DateTime<Utc>,
        resolves_at: DateTime<Utc>,
        resolution: Resolution,
    ) -> Result<Self> {
        let market_id = market_id.into();
        if market_id.trim().is_empty() {
            return Err(EngineError::InvalidSnapshot("empty market id".to_string()));
        }
        if yes_price < Decimal::ZERO || yes_price > Decimal::ONE {
            return Err(EngineError::InvalidSnapshot(format!(
                "price {} out of range for {}",
                yes_price, market_id
            )));
        }
        let category = category.into().trim().to_lowercase();
        Ok(Self {
            market_id,
            category: if category.is_empty() {
                "other".to_string()
            } else {
                category
            },
            yes_price,
            observed_at,
            resolves_at,
            resolution,
        })
    }

    /// Time remaining until scheduled resolution (negative once past)
    pub fn time_to_resolution(&self) -> Duration {
        self.resolves_at - self.observed_at
    }

    /// Hours remaining until resolution, as a decimal
    pub fn hours_to_resolution(&self) -> Decimal {
        Decimal::from(self.time_to_resolution().num_seconds()) / Decimal::from(3600)
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_resolved()
    }
}

/// Price as delivered by external feeds: either a JSON number or a string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPrice {
    Number(f64),
    Text(String),
}

impl RawPrice {
    pub fn to_decimal(&self) -> Result<Decimal> {
        let text = match self {
            RawPrice::Number(n) => n.to_string(),
            RawPrice::Text(s) => s.trim().to_string(),
        };
        Decimal::from_str(&text)
            .map_err(|e| EngineError::InvalidSnapshot(format!("invalid price '{}': {}", text, e)))
    }
}

/// Loosely-typed snapshot record as found in feed payloads and replay files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSnapshot {
    #[serde(alias = "marketId", alias = "token_id")]
    pub market_id: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(alias = "yesPrice", alias = "price")]
    pub yes_price: RawPrice,
    #[serde(alias = "observedAt", alias = "timestamp")]
    pub observed_at: String,
    #[serde(alias = "resolvesAt", alias = "end_date")]
    pub resolves_at: String,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default, alias = "winningOutcome")]
    pub winning_outcome: Option<String>,
}

impl TryFrom<RawSnapshot> for Snapshot {
    type Error = EngineError;

    fn try_from(raw: RawSnapshot) -> Result<Self> {
        let price = raw.yes_price.to_decimal()?;
        let observed_at = parse_timestamp(&raw.observed_at).ok_or_else(|| {
            EngineError::InvalidSnapshot(format!("unparsable observed_at '{}'", raw.observed_at))
        })?;
        let resolves_at = parse_timestamp(&raw.resolves_at).ok_or_else(|| {
            EngineError::InvalidSnapshot(format!("unparsable resolves_at '{}'", raw.resolves_at))
        })?;

        let resolution = if raw.resolved {
            match raw.winning_outcome.as_deref() {
                Some(label) if !label.trim().is_empty() => Resolution::from_outcome_label(label),
                _ => {
                    return Err(EngineError::InvalidSnapshot(format!(
                        "resolved market {} has no winning outcome",
                        raw.market_id
                    )))
                }
            }
        } else {
            Resolution::Unresolved
        };

        Snapshot::new(
            raw.market_id,
            raw.category.unwrap_or_default(),
            price,
            observed_at,
            resolves_at,
            resolution,
        )
    }
}

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%d %H:%M:%S+00",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse a timestamp in any of the formats Polymarket APIs emit (UTC assumed)
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Why an order is being placed; confirmations are keyed by market id + intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderIntent {
    Entry,
    TakeProfit,
    StopLoss,
}

/// Order request handed to the external executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderRequest {
    /// Post-only resting buy (entry)
    PlaceMakerBuy {
        market_id: MarketId,
        price: Decimal,
        shares: Decimal,
    },
    /// Post-only resting sell (take-profit)
    PlaceMakerSell {
        market_id: MarketId,
        price: Decimal,
        shares: Decimal,
    },
    /// Immediate fill-or-kill sell (stop-loss)
    PlaceTakerSell {
        market_id: MarketId,
        price: Decimal,
        shares: Decimal,
    },
    /// Withdraw a resting order
    CancelOrder {
        market_id: MarketId,
        intent: OrderIntent,
    },
}

impl OrderRequest {
    pub fn market_id(&self) -> &str {
        match self {
            OrderRequest::PlaceMakerBuy { market_id, .. }
            | OrderRequest::PlaceMakerSell { market_id, .. }
            | OrderRequest::PlaceTakerSell { market_id, .. }
            | OrderRequest::CancelOrder { market_id, .. } => market_id,
        }
    }

    pub fn intent(&self) -> OrderIntent {
        match self {
            OrderRequest::PlaceMakerBuy { .. } => OrderIntent::Entry,
            OrderRequest::PlaceMakerSell { .. } => OrderIntent::TakeProfit,
            OrderRequest::PlaceTakerSell { .. } => OrderIntent::StopLoss,
            OrderRequest::CancelOrder { intent, .. } => *intent,
        }
    }

    pub fn side(&self) -> Option<Side> {
        match self {
            OrderRequest::PlaceMakerBuy { .. } => Some(Side::Buy),
            OrderRequest::PlaceMakerSell { .. } | OrderRequest::PlaceTakerSell { .. } => {
                Some(Side::Sell)
            }
            OrderRequest::CancelOrder { .. } => None,
        }
    }

    /// True for orders that take liquidity and pay the taker fee
    pub fn is_taker(&self) -> bool {
        matches!(self, OrderRequest::PlaceTakerSell { .. })
    }
}

/// Confirmation events fed back by the executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionEvent {
    EntryFilled {
        market_id: MarketId,
        price: Decimal,
        at: DateTime<Utc>,
    },
    ExitFilled {
        market_id: MarketId,
        price: Decimal,
        fee: Decimal,
        at: DateTime<Utc>,
    },
    Cancelled {
        market_id: MarketId,
        intent: OrderIntent,
        at: DateTime<Utc>,
    },
    Rejected {
        market_id: MarketId,
        intent: OrderIntent,
        reason: String,
    },
}

impl ExecutionEvent {
    pub fn market_id(&self) -> &str {
        match self {
            ExecutionEvent::EntryFilled { market_id, .. }
            | ExecutionEvent::ExitFilled { market_id, .. }
            | ExecutionEvent::Cancelled { market_id, .. }
            | ExecutionEvent::Rejected { market_id, .. } => market_id,
        }
    }
}
