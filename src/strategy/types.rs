use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::lifecycle::Position;

/// Why the core declined to enter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// Circuit breaker is halted
    RiskHalted,
    /// Category or total position cap reached
    Capacity,
    /// Not enough uncommitted cash for one position
    InsufficientCash,
    /// Price, time window or resolution state outside the tier
    NotEligible,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::RiskHalted => "risk-halted",
            SkipReason::Capacity => "capacity",
            SkipReason::InsufficientCash => "insufficient-cash",
            SkipReason::NotEligible => "not-eligible",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategy decision output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", content = "reason", rename_all = "snake_case")]
pub enum Action {
    /// Open a position with a resting buy
    Enter,
    /// Keep the current position (or in-flight order) as is
    Hold,
    /// Exit at the take-profit price with a resting sell
    TakeProfitExit,
    /// Exit immediately with a taker sell
    StopLossExit,
    /// No position and no entry
    Skip(SkipReason),
}

impl Action {
    pub fn skip(reason: SkipReason) -> Self {
        Self::Skip(reason)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Enter => write!(f, "enter"),
            Action::Hold => write!(f, "hold"),
            Action::TakeProfitExit => write!(f, "take-profit-exit"),
            Action::StopLossExit => write!(f, "stop-loss-exit"),
            Action::Skip(reason) => write!(f, "skip({})", reason),
        }
    }
}

/// Portfolio aggregate provided to the strategy
///
/// Derived from the active positions on every evaluation and never mutated on
/// its own, so it cannot drift from the lifecycle state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioAggregate {
    /// Active positions per (lowercased) category
    pub by_category: BTreeMap<String, usize>,
    /// Total active positions
    pub total_open: usize,
    /// Capital base minus notional committed to active positions
    pub available_cash: Decimal,
}

impl PortfolioAggregate {
    /// Recompute from positions; `capital_base` is starting capital plus
    /// realized P&L.
    pub fn from_positions<'a>(
        positions: impl IntoIterator<Item = &'a Position>,
        capital_base: Decimal,
    ) -> Self {
        let mut aggregate = Self {
            available_cash: capital_base,
            ..Self::default()
        };
        for position in positions.into_iter().filter(|p| p.is_active()) {
            *aggregate
                .by_category
                .entry(position.category.clone())
                .or_insert(0) += 1;
            aggregate.total_open += 1;
            aggregate.available_cash -= position.notional;
        }
        aggregate
    }

    /// Get the active position count for a category
    pub fn category_count(&self, category: &str) -> usize {
        self.by_category
            .get(&category.to_lowercase())
            .copied()
            .unwrap_or(0)
    }
}
