use rust_decimal::Decimal;

use crate::config::types::StrategyConfig;

/// Which side of the book an order takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Liquidity {
    /// Resting post-only order
    Maker,
    /// Order crossing the spread
    Taker,
}

/// Fee rates applied to fills
///
/// Rates are fractions of traded value. Resting entries and take-profit
/// sells pay the maker rate; only stop-loss exits pay the taker rate.
#[derive(Debug, Clone, PartialEq)]
pub struct FeeSchedule {
    pub maker_fee_rate: Decimal,
    pub taker_fee_rate: Decimal,
}

impl FeeSchedule {
    pub fn from_config(config: &StrategyConfig) -> Self {
        Self {
            maker_fee_rate: config.maker_fee_rate,
            taker_fee_rate: config.taker_fee_rate,
        }
    }

    pub fn rate(&self, liquidity: Liquidity) -> Decimal {
        match liquidity {
            Liquidity::Maker => self.maker_fee_rate,
            Liquidity::Taker => self.taker_fee_rate,
        }
    }

    /// Fee on a fill of `shares` at `price`
    pub fn fee(&self, price: Decimal, shares: Decimal, liquidity: Liquidity) -> Decimal {
        price * shares * self.rate(liquidity)
    }

    /// Cash received from a sell after fees
    pub fn net_proceeds(&self, price: Decimal, shares: Decimal, liquidity: Liquidity) -> Decimal {
        price * shares - self.fee(price, shares, liquidity)
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::from_config(&StrategyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_rates() {
        let fees = FeeSchedule::default();
        assert_eq!(fees.rate(Liquidity::Maker), dec!(0));
        assert_eq!(fees.rate(Liquidity::Taker), dec!(0.005));
    }

    #[test]
    fn test_maker_exit_is_free() {
        let fees = FeeSchedule::default();
        assert_eq!(fees.fee(dec!(0.99), dec!(100), Liquidity::Maker), dec!(0));
        assert_eq!(fees.net_proceeds(dec!(0.99), dec!(100), Liquidity::Maker), dec!(99));
    }

    #[test]
    fn test_taker_stop_fee() {
        // 100 shares at 0.83 = 83.00 traded, 0.5% = 0.415
        let fees = FeeSchedule::default();
        assert_eq!(fees.fee(dec!(0.83), dec!(100), Liquidity::Taker), dec!(0.415));
        assert_eq!(fees.net_proceeds(dec!(0.83), dec!(100), Liquidity::Taker), dec!(82.585));
    }
}
