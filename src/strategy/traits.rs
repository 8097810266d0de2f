use crate::common::types::Snapshot;
use crate::lifecycle::Position;
use crate::risk::RiskState;
use crate::strategy::types::{Action, PortfolioAggregate};

/// Core strategy trait
///
/// Strategies map one observation plus read-only context to an [`Action`].
/// The backtest simulator and the live orchestrator both call the same
/// implementation, so whatever a replay validates is what trades live.
///
/// # Implementation Notes
///
/// - `decide` must be pure: no I/O, no clock reads, no interior mutability
/// - Identical inputs must always produce the identical action
/// - Ineligibility is returned as `Action::Skip`, never as an error
/// - Position/portfolio/risk state is owned by the caller and passed in
///
/// # Example
///
/// ```ignore
/// struct NeverTrade;
///
/// impl Strategy for NeverTrade {
///     fn name(&self) -> &str { "never" }
///
///     fn decide(&self, _: &Snapshot, position: Option<&Position>,
///               _: &PortfolioAggregate, _: &RiskState) -> Action {
///         match position {
///             Some(_) => Action::Hold,
///             None => Action::Skip(SkipReason::NotEligible),
///         }
///     }
/// }
/// ```
pub trait Strategy: Send + Sync {
    /// Unique identifier for this strategy
    fn name(&self) -> &str;

    /// Evaluate one snapshot
    ///
    /// # Arguments
    /// * `snapshot` - Current observation of the market
    /// * `position` - Active position in this market, if any
    /// * `portfolio` - Aggregate of all active positions
    /// * `risk` - Circuit breaker state
    fn decide(
        &self,
        snapshot: &Snapshot,
        position: Option<&Position>,
        portfolio: &PortfolioAggregate,
        risk: &RiskState,
    ) -> Action;
}
