//! Tailend Library
//!
//! Tail-end strategy engine for binary prediction markets: a pure decision
//! core, a position lifecycle state machine and a risk circuit breaker,
//! shared verbatim by a deterministic backtest simulator and a live
//! orchestrator.

pub mod backtest;
pub mod common;
pub mod config;
pub mod lifecycle;
pub mod live;
pub mod polymarket;
pub mod risk;
pub mod strategy;

// Re-export commonly used types
pub use common::channels::LiveEvent;
pub use common::errors::{EngineError, Result};
pub use common::traits::{OrderExecutor, SnapshotSource};
pub use common::types::{
    ExecutionEvent, MarketId, OrderIntent, OrderRequest, RawSnapshot, Resolution, Snapshot,
};
pub use config::types::AppConfig;

pub use backtest::{BacktestReport, BacktestSimulator, PerformanceSummary};
pub use lifecycle::{ExitReason, Position, PositionManager, PositionStatus, TradeRecord};
pub use live::{DryRunExecutor, Orchestrator, SessionSummary};
pub use risk::{CircuitBreaker, HaltReason, RiskState};
pub use strategy::{Action, PortfolioAggregate, SkipReason, Strategy, TailEndStrategy};
