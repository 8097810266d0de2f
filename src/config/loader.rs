//! Configuration loader

use config::{Config, Environment, File};
use std::path::Path;

use super::types::AppConfig;
use crate::common::errors::{EngineError, Result};

/// Load and validate configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. Environment variables (APP__SECTION__KEY)
/// 2. Configuration file (TOML format)
/// 3. Default values
///
/// Validation failures are fatal: nothing downstream runs on a bad config.
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path).required(false));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("APP")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| EngineError::Configuration(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| EngineError::Configuration(e.to_string()))?;

    app_config.validate()?;
    Ok(app_config)
}

/// Load configuration from an in-memory TOML document
pub fn load_from_str(toml: &str) -> Result<AppConfig> {
    let config = Config::builder()
        .add_source(File::from_str(toml, config::FileFormat::Toml))
        .build()
        .map_err(|e| EngineError::Configuration(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| EngineError::Configuration(e.to_string()))?;

    app_config.validate()?;
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_config(Some("does-not-exist.toml")).unwrap();
        assert_eq!(config.strategy.take_profit_price, dec!(0.99));
    }

    #[test]
    fn test_toml_overrides() {
        let config = load_from_str(
            r#"
            [strategy]
            position_size_usd = "25"
            max_positions_per_category = 3

            [risk.reset_policy]
            mode = "cooldown"
            hours = 24
            "#,
        )
        .unwrap();
        assert_eq!(config.strategy.position_size_usd, dec!(25));
        assert_eq!(config.strategy.max_positions_per_category, 3);
        assert_eq!(
            config.risk.reset_policy,
            crate::config::types::ResetPolicy::Cooldown { hours: 24 }
        );
    }

    #[test]
    fn test_invalid_thresholds_are_fatal() {
        let result = load_from_str(
            r#"
            [strategy]
            hard_stop_loss_price = "0.99"
            "#,
        );
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[test]
    fn test_oversized_cooldown_is_fatal() {
        let result = load_from_str(
            r#"
            [risk.reset_policy]
            mode = "cooldown"
            hours = 10000000000
            "#,
        );
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[test]
    fn test_order_retries_override() {
        let config = load_from_str(
            r#"
            [settings]
            max_order_retries = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.settings.max_order_retries, 5);
    }
}
