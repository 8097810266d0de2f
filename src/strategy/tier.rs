use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::common::types::Snapshot;
use crate::config::types::StrategyConfig;

/// Lowest price a taker stop-loss sell is ever placed at
const MIN_EXIT_PRICE: Decimal = dec!(0.01);

/// Named eligibility band: price range, time window and sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub name: String,
    pub price_low: Decimal,
    pub price_high: Decimal,
    pub max_hours_to_resolution: Decimal,
    pub position_size_usd: Decimal,
    pub take_profit_price: Decimal,
    pub hard_stop_loss_price: Decimal,
    pub entry_tick_improvement: Decimal,
    pub stop_loss_slippage: Decimal,
}

impl Tier {
    pub fn from_config(config: &StrategyConfig) -> Self {
        Self {
            name: config.tier_name.clone(),
            price_low: config.entry_price_low,
            price_high: config.entry_price_high,
            max_hours_to_resolution: config.max_hours_to_resolution,
            position_size_usd: config.position_size_usd,
            take_profit_price: config.take_profit_price,
            hard_stop_loss_price: config.hard_stop_loss_price,
            entry_tick_improvement: config.entry_tick_improvement,
            stop_loss_slippage: config.stop_loss_slippage,
        }
    }

    /// Price inside the band and resolution strictly within (0, max) hours
    pub fn matches(&self, snapshot: &Snapshot) -> bool {
        if snapshot.is_resolved() {
            return false;
        }
        let price = snapshot.yes_price;
        let hours = snapshot.hours_to_resolution();
        price >= self.price_low
            && price <= self.price_high
            && hours > Decimal::ZERO
            && hours < self.max_hours_to_resolution
    }

    /// Resting entry price: one tick above the observed price, capped at the band
    pub fn entry_price(&self, observed: Decimal) -> Decimal {
        (observed + self.entry_tick_improvement).min(self.price_high)
    }

    /// Taker stop-loss price with slippage, floored at one cent
    pub fn stop_exit_price(&self, observed: Decimal) -> Decimal {
        (observed - self.stop_loss_slippage).max(MIN_EXIT_PRICE)
    }
}
