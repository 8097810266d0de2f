//! Position lifecycle
//!
//! [`Position`] holds the per-market state machine; [`PositionManager`]
//! drives it from decided actions, execution confirmations and settlement.

mod manager;
mod position;

pub use manager::{PositionManager, RetryDecision, Settlement};
pub use position::{ExitReason, Position, PositionStatus, TradeRecord};
