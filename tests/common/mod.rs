//! Common test utilities and fixtures

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tailend::common::types::{Resolution, Snapshot};
use tailend::config::AppConfig;
use tailend::lifecycle::{ExitReason, TradeRecord};
use tailend::strategy::PortfolioAggregate;

/// Default configuration shared by every test
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::default);

/// Fixed reference time so replays are reproducible
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 14, 12, 0, 0).unwrap()
}

/// Builder for snapshots relative to [`t0`]
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    market_id: String,
    category: String,
    price: Decimal,
    minutes: i64,
    hours_left: i64,
    resolution: Resolution,
}

pub fn snap(market_id: &str) -> SnapshotBuilder {
    SnapshotBuilder {
        market_id: market_id.to_string(),
        category: "politics".to_string(),
        price: dec!(0.96),
        minutes: 0,
        hours_left: 6,
        resolution: Resolution::Unresolved,
    }
}

impl SnapshotBuilder {
    pub fn category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    pub fn price(mut self, price: Decimal) -> Self {
        self.price = price;
        self
    }

    /// Observation time, minutes after t0
    pub fn at(mut self, minutes: i64) -> Self {
        self.minutes = minutes;
        self
    }

    /// Hours from t0 until scheduled resolution
    pub fn hours_left(mut self, hours: i64) -> Self {
        self.hours_left = hours;
        self
    }

    pub fn resolved(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self.price = resolution.settlement_value().unwrap_or(self.price);
        self
    }

    pub fn build(self) -> Snapshot {
        Snapshot::new(
            self.market_id,
            self.category,
            self.price,
            t0() + Duration::minutes(self.minutes),
            t0() + Duration::hours(self.hours_left),
            self.resolution,
        )
        .expect("fixture snapshot must be valid")
    }
}

/// Portfolio with plenty of cash and no positions
pub fn empty_portfolio() -> PortfolioAggregate {
    PortfolioAggregate {
        available_cash: dec!(10000),
        ..PortfolioAggregate::default()
    }
}

/// Closed trade with the given P&L
pub fn trade(index: i64, pnl: Decimal) -> TradeRecord {
    let entry_time = t0() + Duration::hours(index);
    TradeRecord {
        market_id: format!("m{}", index),
        category: "politics".to_string(),
        tier: "TierA".to_string(),
        entry_price: dec!(0.95),
        exit_price: if pnl > Decimal::ZERO { dec!(0.99) } else { dec!(0.83) },
        size: dec!(50),
        notional: dec!(47.5),
        entry_time,
        exit_time: entry_time + Duration::minutes(30),
        holding_seconds: 1800,
        exit_reason: if pnl > Decimal::ZERO {
            ExitReason::TakeProfit
        } else {
            ExitReason::StopLoss
        },
        fees: Decimal::ZERO,
        realized_pnl: pnl,
    }
}

/// Sample API responses for testing
pub mod api_responses {
    /// One page of Gamma markets: one tradeable, one blacklisted, one multi-outcome
    pub const GAMMA_PAGE: &str = r#"[
        {
            "id": "501",
            "question": "Will the Senate pass the bill by Friday?",
            "conditionId": "0xaaa",
            "endDate": "2099-01-01T00:00:00Z",
            "volumeNum": 25000,
            "outcomes": "[\"Yes\", \"No\"]",
            "outcomePrices": "[\"0.96\", \"0.04\"]",
            "clobTokenIds": "[\"yes_501\", \"no_501\"]",
            "tags": [{"label": "Politics"}],
            "closed": false
        },
        {
            "id": "502",
            "question": "Will the court ruling be overturned?",
            "endDate": "2099-01-01T00:00:00Z",
            "volumeNum": 25000,
            "outcomes": "[\"Yes\", \"No\"]",
            "clobTokenIds": "[\"yes_502\", \"no_502\"]",
            "closed": false
        },
        {
            "id": "503",
            "question": "Which team wins the cup?",
            "endDate": "2099-01-01T00:00:00Z",
            "volumeNum": 25000,
            "outcomes": "[\"A\", \"B\", \"C\"]",
            "clobTokenIds": "[\"a\", \"b\", \"c\"]",
            "closed": false
        }
    ]"#;

    /// Order book for the tradeable market
    pub const ORDER_BOOK: &str = r#"{
        "market": "0xaaa",
        "asset_id": "yes_501",
        "bids": [
            {"price": "0.95", "size": "300"},
            {"price": "0.96", "size": "120"}
        ],
        "asks": [
            {"price": "0.97", "size": "80"}
        ]
    }"#;

    /// The tradeable market after it resolved YES
    pub const RESOLVED_MARKET: &str = r#"{
        "id": "501",
        "question": "Will the Senate pass the bill by Friday?",
        "endDate": "2099-01-01T00:00:00Z",
        "outcomes": "[\"Yes\", \"No\"]",
        "outcomePrices": "[\"1\", \"0\"]",
        "clobTokenIds": "[\"yes_501\", \"no_501\"]",
        "tags": [{"label": "Politics"}],
        "closed": true
    }"#;
}
