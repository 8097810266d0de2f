//! Tail-end strategy: buy outcomes that are nearly certain shortly before
//! resolution, sell at the take-profit price or on a confirmed hard stop.

use tracing::trace;

use crate::common::types::Snapshot;
use crate::config::types::StrategyConfig;
use crate::lifecycle::{Position, PositionStatus};
use crate::risk::RiskState;
use crate::strategy::tier::Tier;
use crate::strategy::traits::Strategy;
use crate::strategy::types::{Action, PortfolioAggregate, SkipReason};

/// Decision core shared by backtest and live
#[derive(Debug, Clone)]
pub struct TailEndStrategy {
    config: StrategyConfig,
    tier: Tier,
}

impl TailEndStrategy {
    pub fn new(config: StrategyConfig) -> Self {
        let tier = Tier::from_config(&config);
        Self { config, tier }
    }

    fn exit_decision(&self, snapshot: &Snapshot, position: &Position) -> Action {
        // Orders already in flight; wait for their confirmation.
        if position.status != PositionStatus::Open {
            return Action::Hold;
        }

        let price = snapshot.yes_price;
        if price >= self.config.take_profit_price {
            return Action::TakeProfitExit;
        }

        // stop_breach_count holds the breaches seen before this snapshot
        if price < self.config.hard_stop_loss_price
            && position.stop_breach_count >= self.config.stop_loss_confirmation_count
        {
            return Action::StopLossExit;
        }

        Action::Hold
    }

    fn entry_decision(
        &self,
        snapshot: &Snapshot,
        portfolio: &PortfolioAggregate,
        risk: &RiskState,
    ) -> Action {
        if risk.halted {
            return Action::skip(SkipReason::RiskHalted);
        }

        if portfolio.category_count(&snapshot.category) >= self.config.max_positions_per_category
            || portfolio.total_open >= self.config.max_total_open_positions
        {
            return Action::skip(SkipReason::Capacity);
        }

        if portfolio.available_cash < self.config.position_size_usd {
            return Action::skip(SkipReason::InsufficientCash);
        }

        if !self.tier.matches(snapshot) {
            return Action::skip(SkipReason::NotEligible);
        }

        Action::Enter
    }
}

impl Strategy for TailEndStrategy {
    fn name(&self) -> &str {
        "tail_end"
    }

    fn decide(
        &self,
        snapshot: &Snapshot,
        position: Option<&Position>,
        portfolio: &PortfolioAggregate,
        risk: &RiskState,
    ) -> Action {
        let action = match position.filter(|p| p.is_active()) {
            Some(position) => self.exit_decision(snapshot, position),
            None => self.entry_decision(snapshot, portfolio, risk),
        };
        trace!(market = %snapshot.market_id, price = %snapshot.yes_price, %action, "decided");
        action
    }
}
