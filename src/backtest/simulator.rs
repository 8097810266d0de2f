//! Deterministic replay of historical snapshots
//!
//! Fill model:
//! - resting maker orders (entries, take-profit exits) fill at their limit
//!   price on the snapshot that placed them
//! - stop-loss exits fill immediately as taker orders and pay the taker fee
//! - no partial fills
//!
//! Snapshots are processed in (observed_at, market_id) order, one at a time,
//! so no position ever sees a price from a later timestamp.

use tracing::{debug, info};

use super::ledger::Ledger;
use super::report::{BacktestReport, PerformanceSummary};
use crate::common::errors::Result;
use crate::common::types::{ExecutionEvent, OrderRequest, Snapshot};
use crate::config::types::AppConfig;
use crate::lifecycle::{Position, PositionManager, Settlement, TradeRecord};
use crate::risk::{CircuitBreaker, RiskState};
use crate::strategy::{Liquidity, Strategy};

/// Replays snapshots through the same strategy, lifecycle manager and
/// breaker the live orchestrator uses
pub struct BacktestSimulator<S: Strategy> {
    strategy: S,
    manager: PositionManager,
    breaker: CircuitBreaker,
    ledger: Ledger,
    processed: usize,
}

impl<S: Strategy> BacktestSimulator<S> {
    pub fn new(strategy: S, config: &AppConfig) -> Self {
        let capital = config.backtest.initial_capital;
        Self {
            strategy,
            manager: PositionManager::new(&config.strategy),
            breaker: CircuitBreaker::new(config.risk.clone(), capital),
            ledger: Ledger::new(capital),
            processed: 0,
        }
    }

    /// Continue a run from the open positions and risk state of a previous report
    pub fn resume(
        strategy: S,
        config: &AppConfig,
        open_positions: Vec<Position>,
        risk: RiskState,
    ) -> Result<Self> {
        let capital = config.backtest.initial_capital + risk.realized_pnl;
        Ok(Self {
            strategy,
            manager: PositionManager::with_positions(&config.strategy, open_positions)?,
            breaker: CircuitBreaker::with_state(
                config.risk.clone(),
                config.backtest.initial_capital,
                risk,
            ),
            ledger: Ledger::new(capital),
            processed: 0,
        })
    }

    pub fn manager(&self) -> &PositionManager {
        &self.manager
    }

    pub fn risk(&self) -> &RiskState {
        self.breaker.state()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Sort and replay a full snapshot sequence
    pub fn run(mut self, mut snapshots: Vec<Snapshot>) -> Result<BacktestReport> {
        snapshots.sort_by(|a, b| {
            a.observed_at
                .cmp(&b.observed_at)
                .then_with(|| a.market_id.cmp(&b.market_id))
        });

        info!(
            strategy = self.strategy.name(),
            snapshots = snapshots.len(),
            capital = %self.ledger.initial_capital(),
            "Starting backtest"
        );
        for snapshot in &snapshots {
            self.step(snapshot)?;
        }
        Ok(self.finish())
    }

    /// Process one snapshot
    pub fn step(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.processed += 1;
        self.breaker.poll(snapshot.observed_at);

        if snapshot.is_resolved() {
            // Entries fill on placement here, so there is never a resting buy to withdraw
            if let Some(Settlement::Closed(record)) = self.manager.settle(snapshot)? {
                self.close(record);
            }
            return Ok(());
        }

        let capital_base = self.ledger.initial_capital() + self.ledger.cumulative_pnl();
        let aggregate = self.manager.aggregate(capital_base);
        let action = self.strategy.decide(
            snapshot,
            self.manager.position(&snapshot.market_id),
            &aggregate,
            self.breaker.state(),
        );

        let Some(request) = self.manager.apply(snapshot, action)? else {
            return Ok(());
        };
        let fill = self.simulate_fill(&request, snapshot);
        debug!(market = %snapshot.market_id, ?request, "Simulated fill");
        if let Some(record) = self.manager.on_execution(&fill)? {
            self.close(record);
        }
        Ok(())
    }

    fn simulate_fill(&self, request: &OrderRequest, snapshot: &Snapshot) -> ExecutionEvent {
        let at = snapshot.observed_at;
        let fees = self.manager.fees();
        match request {
            OrderRequest::PlaceMakerBuy { market_id, price, .. } => ExecutionEvent::EntryFilled {
                market_id: market_id.clone(),
                price: *price,
                at,
            },
            OrderRequest::PlaceMakerSell {
                market_id,
                price,
                shares,
            } => ExecutionEvent::ExitFilled {
                market_id: market_id.clone(),
                price: *price,
                fee: fees.fee(*price, *shares, Liquidity::Maker),
                at,
            },
            OrderRequest::PlaceTakerSell {
                market_id,
                price,
                shares,
            } => ExecutionEvent::ExitFilled {
                market_id: market_id.clone(),
                price: *price,
                fee: fees.fee(*price, *shares, Liquidity::Taker),
                at,
            },
            OrderRequest::CancelOrder { market_id, intent } => ExecutionEvent::Cancelled {
                market_id: market_id.clone(),
                intent: *intent,
                at,
            },
        }
    }

    fn close(&mut self, record: TradeRecord) {
        self.breaker.record(&record);
        self.ledger.push(record);
    }

    pub fn finish(self) -> BacktestReport {
        let open_positions: Vec<Position> = self.manager.active_positions().cloned().collect();
        let (trades, equity_curve) = self.ledger.clone().into_parts();
        let summary = PerformanceSummary::from_trades(&trades, self.ledger.initial_capital());
        let report = BacktestReport {
            strategy: self.strategy.name().to_string(),
            snapshots_processed: self.processed,
            trades,
            equity_curve,
            open_positions,
            risk: self.breaker.state().clone(),
            summary,
        };
        info!(
            trades = report.summary.total_trades,
            open = report.open_positions.len(),
            pnl = %report.summary.total_pnl,
            win_rate = %report.summary.win_rate.round_dp(4),
            "{}",
            report.risk.status_text()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::Resolution;
    use crate::lifecycle::ExitReason;
    use crate::strategy::TailEndStrategy;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 2, 9, 0, 0).unwrap()
    }

    fn snap(market: &str, price: Decimal, minutes: i64, resolution: Resolution) -> Snapshot {
        Snapshot::new(
            market,
            "sports",
            price,
            t0() + Duration::minutes(minutes),
            t0() + Duration::hours(8),
            resolution,
        )
        .unwrap()
    }

    fn simulator() -> BacktestSimulator<TailEndStrategy> {
        let config = AppConfig::default();
        BacktestSimulator::new(TailEndStrategy::new(config.strategy.clone()), &config)
    }

    #[test]
    fn test_take_profit_trade() {
        let report = simulator()
            .run(vec![
                snap("m1", dec!(0.99), 30, Resolution::Unresolved),
                snap("m1", dec!(0.95), 0, Resolution::Unresolved),
            ])
            .unwrap();

        assert_eq!(report.trades.len(), 1);
        let trade = &report.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
        assert_eq!(trade.entry_price, dec!(0.951));
        assert_eq!(trade.exit_price, dec!(0.99));
        assert_eq!(trade.fees, Decimal::ZERO);
        assert_eq!(report.equity_curve.len(), 1);
        assert!(report.open_positions.is_empty());
    }

    #[test]
    fn test_stop_loss_pays_taker_fee() {
        let report = simulator()
            .run(vec![
                snap("m1", dec!(0.95), 0, Resolution::Unresolved),
                snap("m1", dec!(0.84), 10, Resolution::Unresolved),
                snap("m1", dec!(0.80), 20, Resolution::Unresolved),
            ])
            .unwrap();

        let trade = &report.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert_eq!(trade.exit_price, dec!(0.79));
        assert_eq!(trade.fees, dec!(0.79) * trade.size * dec!(0.005));
        assert!(!trade.is_win());
    }

    #[test]
    fn test_unresolved_position_reported_open() {
        let report = simulator()
            .run(vec![snap("m1", dec!(0.96), 0, Resolution::Unresolved)])
            .unwrap();
        assert!(report.trades.is_empty());
        assert_eq!(report.open_positions.len(), 1);
        assert_eq!(report.snapshots_processed, 1);
    }

    #[test]
    fn test_settlement_after_entry() {
        let report = simulator()
            .run(vec![
                snap("m1", dec!(0.96), 0, Resolution::Unresolved),
                snap("m1", dec!(0), 60, Resolution::No),
                snap("m1", dec!(0), 61, Resolution::No),
            ])
            .unwrap();
        assert_eq!(report.trades.len(), 1);
        assert_eq!(report.trades[0].exit_reason, ExitReason::ResolutionSettlement);
        let trade = &report.trades[0];
        assert_eq!(trade.exit_price, Decimal::ZERO);
        assert_eq!(trade.realized_pnl, (Decimal::ZERO - trade.entry_price) * trade.size);
    }
}
