//! Backtest: replay historical snapshots through the decision core
//!
//! ```text
//! snapshots.json ──▶ data::load_snapshots ──▶ BacktestSimulator::run
//!                                                  │
//!                  Strategy::decide ◀──────────────┤
//!                  PositionManager::apply ◀────────┤
//!                  simulated fill ─▶ on_execution ─┤
//!                  CircuitBreaker::record, Ledger ◀┘
//!                                                  ▼
//!                                            BacktestReport
//! ```

mod data;
mod ledger;
mod report;
mod simulator;

pub use data::{load_snapshots, parse_snapshots, SnapshotSet};
pub use ledger::{EquityPoint, Ledger};
pub use report::{BacktestReport, GroupStats, PerformanceSummary};
pub use simulator::BacktestSimulator;
