//! Configuration types

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::common::errors::{EngineError, Result};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Entry/exit thresholds shared by backtest and live
    #[serde(default)]
    pub strategy: StrategyConfig,
    /// Circuit breaker thresholds
    #[serde(default)]
    pub risk: RiskConfig,
    /// Replay settings
    #[serde(default)]
    pub backtest: BacktestConfig,
    /// Polymarket snapshot feed settings
    #[serde(default)]
    pub feed: FeedConfig,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

impl AppConfig {
    /// Reject out-of-range thresholds before any snapshot is processed
    pub fn validate(&self) -> Result<()> {
        self.strategy.validate()?;
        self.risk.validate()?;
        self.backtest.validate()?;
        self.feed.validate()
    }
}

fn invalid(msg: impl Into<String>) -> EngineError {
    EngineError::Configuration(msg.into())
}

/// Strategy thresholds (tier A of the tail-end strategy)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Name recorded on positions opened by this tier
    #[serde(default = "default_tier_name")]
    pub tier_name: String,
    #[serde(default = "default_entry_price_low")]
    pub entry_price_low: Decimal,
    #[serde(default = "default_entry_price_high")]
    pub entry_price_high: Decimal,
    #[serde(default = "default_max_hours_to_resolution")]
    pub max_hours_to_resolution: Decimal,
    #[serde(default = "default_take_profit_price")]
    pub take_profit_price: Decimal,
    #[serde(default = "default_hard_stop_loss_price")]
    pub hard_stop_loss_price: Decimal,
    /// Fixed USD notional committed per position
    #[serde(default = "default_position_size_usd")]
    pub position_size_usd: Decimal,
    #[serde(default = "default_max_positions_per_category")]
    pub max_positions_per_category: usize,
    #[serde(default = "default_max_total_open_positions")]
    pub max_total_open_positions: usize,
    /// Observations below the stop required after the first breach
    #[serde(default = "default_stop_loss_confirmation_count")]
    pub stop_loss_confirmation_count: u32,
    /// Price improvement over the observed bid for resting entries
    #[serde(default = "default_entry_tick_improvement")]
    pub entry_tick_improvement: Decimal,
    /// Price concession for taker stop-loss exits
    #[serde(default = "default_stop_loss_slippage")]
    pub stop_loss_slippage: Decimal,
    #[serde(default)]
    pub maker_fee_rate: Decimal,
    /// Applied only on stop-loss exits
    #[serde(default = "default_taker_fee_rate")]
    pub taker_fee_rate: Decimal,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            tier_name: default_tier_name(),
            entry_price_low: default_entry_price_low(),
            entry_price_high: default_entry_price_high(),
            max_hours_to_resolution: default_max_hours_to_resolution(),
            take_profit_price: default_take_profit_price(),
            hard_stop_loss_price: default_hard_stop_loss_price(),
            position_size_usd: default_position_size_usd(),
            max_positions_per_category: default_max_positions_per_category(),
            max_total_open_positions: default_max_total_open_positions(),
            stop_loss_confirmation_count: default_stop_loss_confirmation_count(),
            entry_tick_improvement: default_entry_tick_improvement(),
            stop_loss_slippage: default_stop_loss_slippage(),
            maker_fee_rate: Decimal::ZERO,
            taker_fee_rate: default_taker_fee_rate(),
        }
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<()> {
        let unit = Decimal::ZERO..=Decimal::ONE;
        for (name, value) in [
            ("entry_price_low", self.entry_price_low),
            ("entry_price_high", self.entry_price_high),
            ("take_profit_price", self.take_profit_price),
            ("hard_stop_loss_price", self.hard_stop_loss_price),
        ] {
            if !unit.contains(&value) {
                return Err(invalid(format!("{} must be within [0, 1], got {}", name, value)));
            }
        }
        if self.entry_price_low > self.entry_price_high {
            return Err(invalid(format!(
                "entry band is inverted: {} > {}",
                self.entry_price_low, self.entry_price_high
            )));
        }
        if self.hard_stop_loss_price >= self.take_profit_price {
            return Err(invalid(format!(
                "hard_stop_loss_price {} must be below take_profit_price {}",
                self.hard_stop_loss_price, self.take_profit_price
            )));
        }
        if self.hard_stop_loss_price >= self.entry_price_low {
            return Err(invalid(format!(
                "hard_stop_loss_price {} must be below entry_price_low {}",
                self.hard_stop_loss_price, self.entry_price_low
            )));
        }
        if self.max_hours_to_resolution <= Decimal::ZERO {
            return Err(invalid("max_hours_to_resolution must be positive"));
        }
        if self.position_size_usd <= Decimal::ZERO {
            return Err(invalid("position_size_usd must be positive"));
        }
        if self.max_positions_per_category == 0 || self.max_total_open_positions == 0 {
            return Err(invalid("position caps must be at least 1"));
        }
        if self.max_positions_per_category > self.max_total_open_positions {
            return Err(invalid(
                "max_positions_per_category cannot exceed max_total_open_positions",
            ));
        }
        if self.entry_tick_improvement < Decimal::ZERO || self.stop_loss_slippage < Decimal::ZERO {
            return Err(invalid("price adjustments cannot be negative"));
        }
        for (name, rate) in [
            ("maker_fee_rate", self.maker_fee_rate),
            ("taker_fee_rate", self.taker_fee_rate),
        ] {
            if rate < Decimal::ZERO || rate >= Decimal::ONE {
                return Err(invalid(format!("{} must be within [0, 1), got {}", name, rate)));
            }
        }
        if self.tier_name.trim().is_empty() {
            return Err(invalid("tier_name cannot be empty"));
        }
        Ok(())
    }
}

fn default_tier_name() -> String {
    "TierA".to_string()
}

fn default_entry_price_low() -> Decimal {
    dec!(0.94)
}

fn default_entry_price_high() -> Decimal {
    dec!(0.99)
}

fn default_max_hours_to_resolution() -> Decimal {
    dec!(12)
}

fn default_take_profit_price() -> Decimal {
    dec!(0.99)
}

fn default_hard_stop_loss_price() -> Decimal {
    dec!(0.85)
}

fn default_position_size_usd() -> Decimal {
    dec!(50)
}

fn default_max_positions_per_category() -> usize {
    5
}

fn default_max_total_open_positions() -> usize {
    50
}

fn default_stop_loss_confirmation_count() -> u32 {
    1
}

fn default_entry_tick_improvement() -> Decimal {
    dec!(0.001)
}

fn default_stop_loss_slippage() -> Decimal {
    dec!(0.01)
}

fn default_taker_fee_rate() -> Decimal {
    dec!(0.005)
}

/// Longest accepted breaker cooldown (one year)
pub const MAX_COOLDOWN_HOURS: i64 = 24 * 366;

/// How a halted circuit breaker may resume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ResetPolicy {
    /// Only an explicit `reset()` resumes entries
    Manual,
    /// Resume automatically once the cooling period has elapsed
    Cooldown { hours: i64 },
}

impl Default for ResetPolicy {
    fn default() -> Self {
        ResetPolicy::Manual
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_halt_absolute_loss")]
    pub risk_halt_absolute_loss_usd: Decimal,
    #[serde(default = "default_halt_fractional_loss")]
    pub risk_halt_fractional_loss: Decimal,
    #[serde(default = "default_halt_consecutive_losses")]
    pub risk_halt_consecutive_losses: u32,
    #[serde(default)]
    pub reset_policy: ResetPolicy,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_halt_absolute_loss_usd: default_halt_absolute_loss(),
            risk_halt_fractional_loss: default_halt_fractional_loss(),
            risk_halt_consecutive_losses: default_halt_consecutive_losses(),
            reset_policy: ResetPolicy::Manual,
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<()> {
        if self.risk_halt_absolute_loss_usd <= Decimal::ZERO {
            return Err(invalid("risk_halt_absolute_loss_usd must be positive"));
        }
        if self.risk_halt_fractional_loss <= Decimal::ZERO
            || self.risk_halt_fractional_loss > Decimal::ONE
        {
            return Err(invalid("risk_halt_fractional_loss must be within (0, 1]"));
        }
        if self.risk_halt_consecutive_losses == 0 {
            return Err(invalid("risk_halt_consecutive_losses must be at least 1"));
        }
        if let ResetPolicy::Cooldown { hours } = self.reset_policy {
            if hours <= 0 || hours > MAX_COOLDOWN_HOURS {
                return Err(invalid(format!(
                    "cooldown hours must be within [1, {}]",
                    MAX_COOLDOWN_HOURS
                )));
            }
        }
        Ok(())
    }
}

fn default_halt_absolute_loss() -> Decimal {
    dec!(500)
}

fn default_halt_fractional_loss() -> Decimal {
    dec!(0.10)
}

fn default_halt_consecutive_losses() -> u32 {
    10
}

/// Backtest replay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Starting capital in USD
    #[serde(default = "default_initial_capital")]
    pub initial_capital: Decimal,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: default_initial_capital(),
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<()> {
        if self.initial_capital <= Decimal::ZERO {
            return Err(invalid("initial_capital must be positive"));
        }
        Ok(())
    }
}

fn default_initial_capital() -> Decimal {
    dec!(10000)
}

/// Polymarket snapshot feed configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Base URL for the CLOB REST API
    #[serde(default = "default_clob_url")]
    pub clob_url: String,
    /// Gamma API URL for market discovery
    #[serde(default = "default_gamma_url")]
    pub gamma_url: String,
    /// Seconds between scanner cycles
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Gamma pages (of `page_size` markets) fetched per cycle
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Markets below this traded volume are ignored
    #[serde(default = "default_min_volume")]
    pub min_market_volume: Decimal,
    /// Markets whose question or tags contain any of these are ignored
    #[serde(default = "default_blacklist")]
    pub blacklist_keywords: Vec<String>,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            clob_url: default_clob_url(),
            gamma_url: default_gamma_url(),
            poll_interval_seconds: default_poll_interval(),
            max_pages: default_max_pages(),
            page_size: default_page_size(),
            min_market_volume: default_min_volume(),
            blacklist_keywords: default_blacklist(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl FeedConfig {
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.clob_url)?;
        url::Url::parse(&self.gamma_url)?;
        if self.poll_interval_seconds == 0 {
            return Err(invalid("poll_interval_seconds must be at least 1"));
        }
        if self.page_size == 0 {
            return Err(invalid("page_size must be at least 1"));
        }
        Ok(())
    }
}

fn default_clob_url() -> String {
    "https://clob.polymarket.com".to_string()
}

fn default_gamma_url() -> String {
    "https://gamma-api.polymarket.com".to_string()
}

fn default_poll_interval() -> u64 {
    60
}

fn default_max_pages() -> u32 {
    3
}

fn default_page_size() -> u32 {
    100
}

fn default_min_volume() -> Decimal {
    dec!(5000)
}

fn default_blacklist() -> Vec<String> {
    [
        "dispute",
        "uma",
        "opinion",
        "oscar",
        "grammy",
        "emmy",
        "golden globe",
        "x poll",
        "twitter poll",
        "tweet",
        "twitter",
        "gymnastics score",
        "diving score",
        "figure skating",
        "sec sue",
        "indict",
        "court ruling",
        "first ever",
        "first time",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_request_timeout() -> u64 {
    30
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Capacity of the live event channel
    #[serde(default = "default_channel_size")]
    pub event_channel_size: usize,
    /// Times a rejected live order is re-sent before the position is rolled back
    #[serde(default = "default_max_order_retries")]
    pub max_order_retries: u32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            event_channel_size: default_channel_size(),
            max_order_retries: default_max_order_retries(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_channel_size() -> usize {
    1000
}

fn default_max_order_retries() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.strategy.entry_price_low, dec!(0.94));
        assert_eq!(config.strategy.max_total_open_positions, 50);
        assert_eq!(config.risk.risk_halt_consecutive_losses, 10);
        assert_eq!(config.risk.reset_policy, ResetPolicy::Manual);
    }

    #[test]
    fn test_stop_above_take_profit_rejected() {
        let mut config = StrategyConfig::default();
        config.hard_stop_loss_price = dec!(0.995);
        assert!(matches!(config.validate(), Err(EngineError::Configuration(_))));
    }

    #[test]
    fn test_inverted_band_rejected() {
        let mut config = StrategyConfig::default();
        config.entry_price_low = dec!(0.99);
        config.entry_price_high = dec!(0.95);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_taker_fee_range() {
        let mut config = StrategyConfig::default();
        config.taker_fee_rate = dec!(1.2);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cooldown_must_be_positive() {
        let config = RiskConfig {
            reset_policy: ResetPolicy::Cooldown { hours: 0 },
            ..RiskConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cooldown_upper_bound() {
        let config = load_cooldown(MAX_COOLDOWN_HOURS + 1);
        assert!(matches!(config.validate(), Err(EngineError::Configuration(_))));
        assert!(load_cooldown(MAX_COOLDOWN_HOURS).validate().is_ok());
        assert!(load_cooldown(10_000_000_000).validate().is_err());
    }

    fn load_cooldown(hours: i64) -> RiskConfig {
        RiskConfig {
            reset_policy: ResetPolicy::Cooldown { hours },
            ..RiskConfig::default()
        }
    }

    #[test]
    fn test_bad_feed_url_rejected() {
        let config = FeedConfig {
            gamma_url: "not a url".to_string(),
            ..FeedConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
