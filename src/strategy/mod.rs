//! Strategy module for trade decision making
//!
//! The decision core is a pure function of its inputs. Everything stateful
//! (positions, risk, fills) lives outside it and is passed in read-only.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Snapshot source (replay file | polling feed)               │
//! └─────────────────────────────────────────────────────────────┘
//!        │
//!        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Strategy.decide(snapshot, position, portfolio, risk)       │
//! │    → Enter | Hold | TakeProfitExit | StopLossExit | Skip    │
//! └─────────────────────────────────────────────────────────────┘
//!        │
//!        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  PositionManager.apply → OrderRequest                       │
//! │    → simulated fill (backtest) | OrderExecutor (live)       │
//! │  fills → PositionManager.on_execution → TradeRecord         │
//! │        → CircuitBreaker.record                              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`Strategy`]: Trait implemented by decision cores
//! - [`TailEndStrategy`]: The tail-end entry/exit rules
//! - [`Action`]: Decision returned for each snapshot
//! - [`PortfolioAggregate`]: Read-only capacity and cash view
//! - [`Tier`]: Eligibility band and order pricing
//! - [`FeeSchedule`]: Maker/taker fee rates

mod fees;
mod tail_end;
mod tier;
mod traits;
mod types;

pub use fees::{FeeSchedule, Liquidity};
pub use tail_end::TailEndStrategy;
pub use tier::Tier;
pub use traits::Strategy;
pub use types::{Action, PortfolioAggregate, SkipReason};
