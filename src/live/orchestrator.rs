//! Live orchestrator
//!
//! A single actor consumes one ordered event channel, so every decision and
//! every lifecycle/breaker mutation happens on one task. Two concurrent
//! entries can therefore never both pass a stale capacity check.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::common::channels::{create_tracked_channel, LiveEvent};
use crate::common::errors::{EngineError, Result};
use crate::common::traits::OrderExecutor;
use crate::common::types::{ExecutionEvent, MarketId, OrderRequest, Snapshot};
use crate::config::types::AppConfig;
use crate::lifecycle::{Position, PositionManager, RetryDecision, Settlement, TradeRecord};
use crate::risk::{CircuitBreaker, RiskState};
use crate::strategy::Strategy;

/// What a live session did, returned when the actor stops
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub snapshots: usize,
    pub orders: usize,
    pub failed_submissions: usize,
    /// Rejected orders sent again
    pub retried_orders: usize,
    pub trades: Vec<TradeRecord>,
    /// Positions left for a future run (shutdown is non-liquidating)
    pub open_positions: Vec<Position>,
    pub risk: RiskState,
}

pub struct Orchestrator<S: Strategy, E: OrderExecutor> {
    strategy: S,
    executor: E,
    manager: PositionManager,
    breaker: CircuitBreaker,
    capital: Decimal,
    max_order_retries: u32,
    events: mpsc::Receiver<LiveEvent>,
    tracked: watch::Sender<Vec<MarketId>>,
    summary: SessionSummary,
}

impl<S: Strategy, E: OrderExecutor> Orchestrator<S, E> {
    /// Build the actor; the returned receiver publishes the tracked market ids
    pub fn new(
        strategy: S,
        executor: E,
        config: &AppConfig,
        capital: Decimal,
        events: mpsc::Receiver<LiveEvent>,
    ) -> (Self, watch::Receiver<Vec<MarketId>>) {
        let (tracked, tracked_rx) = create_tracked_channel();
        let orchestrator = Self {
            strategy,
            executor,
            manager: PositionManager::new(&config.strategy),
            breaker: CircuitBreaker::new(config.risk.clone(), capital),
            capital,
            max_order_retries: config.settings.max_order_retries,
            events,
            tracked,
            summary: SessionSummary::default(),
        };
        (orchestrator, tracked_rx)
    }

    pub fn manager(&self) -> &PositionManager {
        &self.manager
    }

    pub fn risk(&self) -> &RiskState {
        self.breaker.state()
    }

    /// Consume events until `Shutdown` arrives or every sender is dropped
    pub async fn run(mut self) -> Result<SessionSummary> {
        info!(
            strategy = self.strategy.name(),
            executor = self.executor.executor_name(),
            capital = %self.capital,
            "Orchestrator started"
        );

        while let Some(event) = self.events.recv().await {
            match event {
                LiveEvent::Snapshot(snapshot) => self.on_snapshot(&snapshot).await?,
                LiveEvent::Execution(execution) => self.on_execution(&execution),
                LiveEvent::Shutdown => {
                    self.shutdown(Utc::now()).await;
                    break;
                }
            }
            self.publish_tracked();
        }

        self.summary.open_positions = self.manager.active_positions().cloned().collect();
        self.summary.risk = self.breaker.state().clone();
        info!(
            trades = self.summary.trades.len(),
            open = self.summary.open_positions.len(),
            "Orchestrator stopped. {}",
            self.summary.risk.status_text()
        );
        Ok(self.summary)
    }

    /// Decide and act on one snapshot
    ///
    /// Only lifecycle contract violations are returned as errors; they stop
    /// the actor.
    pub async fn on_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.summary.snapshots += 1;
        self.breaker.poll(snapshot.observed_at);

        if snapshot.is_resolved() {
            match self.manager.settle(snapshot)? {
                Some(Settlement::Closed(record)) => self.close(record),
                Some(Settlement::EntryCancelled(cancel)) => self.submit(cancel).await,
                None => {}
            }
            return Ok(());
        }

        // A re-sent order takes the place of a decision. After a rollback
        // the strategy decides on this same snapshot.
        if let Some(RetryDecision::Resend(request)) =
            self.manager.retry_rejected(snapshot, self.max_order_retries)?
        {
            self.summary.retried_orders += 1;
            self.submit(request).await;
            return Ok(());
        }

        let capital_base = self.capital + self.breaker.state().realized_pnl;
        let aggregate = self.manager.aggregate(capital_base);
        let action = self.strategy.decide(
            snapshot,
            self.manager.position(&snapshot.market_id),
            &aggregate,
            self.breaker.state(),
        );

        if let Some(request) = self.manager.apply(snapshot, action)? {
            self.submit(request).await;
        }
        Ok(())
    }

    /// Apply a confirmation from the executor
    ///
    /// Confirmations come from outside the engine; stale or out-of-order ones
    /// are logged and dropped.
    pub fn on_execution(&mut self, event: &ExecutionEvent) {
        match self.manager.on_execution(event) {
            Ok(Some(record)) => self.close(record),
            Ok(None) => {}
            Err(e @ (EngineError::UnknownPosition(_) | EngineError::InvalidTransition { .. })) => {
                warn!(market = event.market_id(), error = %e, "Ignoring confirmation");
            }
            Err(e) => error!(market = event.market_id(), error = %e, "Confirmation failed"),
        }
    }

    async fn submit(&mut self, request: OrderRequest) {
        self.summary.orders += 1;
        if let Err(e) = self.executor.submit(request.clone()).await {
            self.summary.failed_submissions += 1;
            warn!(market = request.market_id(), error = %e, "Order submission failed");
            if matches!(request, OrderRequest::CancelOrder { .. }) {
                return;
            }
            let rejection = ExecutionEvent::Rejected {
                market_id: request.market_id().to_string(),
                intent: request.intent(),
                reason: e.to_string(),
            };
            self.on_execution(&rejection);
        }
    }

    fn close(&mut self, record: TradeRecord) {
        self.breaker.record(&record);
        self.summary.trades.push(record);
    }

    async fn shutdown(&mut self, at: DateTime<Utc>) {
        let requests = self.manager.shutdown(at);
        info!(
            cancels = requests.len(),
            open = self.manager.active_count(),
            "Shutdown requested, open positions will settle at resolution"
        );
        for request in requests {
            self.submit(request).await;
        }
    }

    fn publish_tracked(&self) {
        let markets = self.manager.tracked_markets();
        self.tracked.send_if_modified(|current| {
            if *current == markets {
                false
            } else {
                *current = markets;
                true
            }
        });
    }
}
