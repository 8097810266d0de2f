//! Position lifecycle manager
//!
//! Single writer of position state. Every transition (decided actions,
//! execution confirmations, settlement, shutdown) funnels through here so the
//! portfolio aggregate recomputed from positions always matches the state
//! machine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::position::{ExitReason, Position, PositionStatus, TradeRecord};
use crate::common::errors::{EngineError, Result};
use crate::common::types::{ExecutionEvent, MarketId, OrderIntent, OrderRequest, Snapshot};
use crate::config::types::StrategyConfig;
use crate::strategy::{Action, FeeSchedule, Liquidity, PortfolioAggregate, Tier};

/// Result of settling a market that held a position
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    /// An open or exiting position closed at the settlement value
    Closed(TradeRecord),
    /// The entry never filled; the resting buy must be withdrawn
    EntryCancelled(OrderRequest),
}

impl Settlement {
    pub fn into_trade(self) -> Option<TradeRecord> {
        match self {
            Settlement::Closed(record) => Some(record),
            Settlement::EntryCancelled(_) => None,
        }
    }
}

/// What to do about an order the executor rejected
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Send the in-flight order again
    Resend(OrderRequest),
    /// Retries exhausted; the position went back to its previous state
    RolledBack,
}

/// Owns the per-market position state machine
#[derive(Debug, Clone)]
pub struct PositionManager {
    tier: Tier,
    fees: FeeSchedule,
    /// Active positions (pending, open, exiting), at most one per market
    positions: BTreeMap<MarketId, Position>,
    /// Closed and cancelled positions in the order they ended
    history: Vec<Position>,
}

impl PositionManager {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            tier: Tier::from_config(config),
            fees: FeeSchedule::from_config(config),
            positions: BTreeMap::new(),
            history: Vec::new(),
        }
    }

    /// Resume with positions carried over from a previous run
    pub fn with_positions(config: &StrategyConfig, positions: Vec<Position>) -> Result<Self> {
        let mut manager = Self::new(config);
        for position in positions.into_iter().filter(|p| p.is_active()) {
            if manager.positions.contains_key(&position.market_id) {
                return Err(EngineError::InvariantViolation(format!(
                    "duplicate active position for {}",
                    position.market_id
                )));
            }
            manager.positions.insert(position.market_id.clone(), position);
        }
        Ok(manager)
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    /// Active position for a market
    pub fn position(&self, market_id: &str) -> Option<&Position> {
        self.positions.get(market_id)
    }

    /// Active positions in market id order
    pub fn active_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn active_count(&self) -> usize {
        self.positions.len()
    }

    pub fn history(&self) -> &[Position] {
        &self.history
    }

    /// Market ids of all active positions
    pub fn tracked_markets(&self) -> Vec<MarketId> {
        self.positions.keys().cloned().collect()
    }

    /// Recompute the portfolio aggregate from active positions
    pub fn aggregate(&self, capital_base: Decimal) -> PortfolioAggregate {
        PortfolioAggregate::from_positions(self.positions.values(), capital_base)
    }

    fn active_mut(&mut self, market_id: &str) -> Result<&mut Position> {
        self.positions
            .get_mut(market_id)
            .ok_or_else(|| EngineError::UnknownPosition(market_id.to_string()))
    }

    fn retire(&mut self, market_id: &str) {
        if let Some(position) = self.positions.remove(market_id) {
            self.history.push(position);
        }
    }

    /// Apply a decided action, returning the order to issue (if any)
    pub fn apply(&mut self, snapshot: &Snapshot, action: Action) -> Result<Option<OrderRequest>> {
        let market_id = snapshot.market_id.as_str();
        match action {
            Action::Enter => {
                if let Some(existing) = self.positions.get(market_id) {
                    return Err(EngineError::InvariantViolation(format!(
                        "enter decided for {} while a {} position exists",
                        market_id, existing.status
                    )));
                }
                let limit_price = self.tier.entry_price(snapshot.yes_price);
                let position = Position::pending(
                    snapshot,
                    &self.tier.name,
                    limit_price,
                    self.tier.position_size_usd,
                );
                let request = OrderRequest::PlaceMakerBuy {
                    market_id: market_id.to_string(),
                    price: limit_price,
                    shares: position.shares,
                };
                info!(
                    market = market_id,
                    category = %position.category,
                    price = %limit_price,
                    shares = %position.shares,
                    "Entry decided"
                );
                self.positions.insert(market_id.to_string(), position);
                Ok(Some(request))
            }
            Action::TakeProfitExit => {
                let price = self.tier.take_profit_price;
                let position = self.active_mut(market_id)?;
                position.begin_exit(ExitReason::TakeProfit)?;
                info!(market = market_id, price = %price, "Take-profit exit decided");
                Ok(Some(OrderRequest::PlaceMakerSell {
                    market_id: market_id.to_string(),
                    price,
                    shares: position.shares,
                }))
            }
            Action::StopLossExit => {
                let price = self.tier.stop_exit_price(snapshot.yes_price);
                let position = self.active_mut(market_id)?;
                position.begin_exit(ExitReason::StopLoss)?;
                warn!(
                    market = market_id,
                    observed = %snapshot.yes_price,
                    price = %price,
                    breaches = position.stop_breach_count,
                    "Stop-loss exit decided"
                );
                Ok(Some(OrderRequest::PlaceTakerSell {
                    market_id: market_id.to_string(),
                    price,
                    shares: position.shares,
                }))
            }
            Action::Hold => {
                let stop = self.tier.hard_stop_loss_price;
                if let Some(position) = self.positions.get_mut(market_id) {
                    position.record_observation(snapshot.yes_price, stop);
                    if position.stop_breach_count == 1 && position.status == PositionStatus::Open {
                        warn!(market = market_id, price = %snapshot.yes_price, "Hard stop breached, awaiting confirmation");
                    }
                }
                Ok(None)
            }
            Action::Skip(reason) => {
                debug!(market = market_id, %reason, "Skipped");
                Ok(None)
            }
        }
    }

    /// Apply an execution confirmation; returns the trade record on close
    pub fn on_execution(&mut self, event: &ExecutionEvent) -> Result<Option<TradeRecord>> {
        let market_id = event.market_id().to_string();
        match event {
            ExecutionEvent::EntryFilled { price, at, .. } => {
                let fees = self.fees.clone();
                let position = self.active_mut(&market_id)?;
                let fee = fees.fee(*price, position.shares, Liquidity::Maker);
                position.confirm_entry(*price, fee, *at)?;
                info!(market = %market_id, price = %price, "Entry filled");
                Ok(None)
            }
            ExecutionEvent::ExitFilled { price, fee, at, .. } => {
                let record = self.active_mut(&market_id)?.confirm_exit(*price, *fee, *at)?;
                self.retire(&market_id);
                info!(
                    market = %market_id,
                    reason = %record.exit_reason,
                    price = %price,
                    pnl = %record.realized_pnl,
                    "Position closed"
                );
                Ok(Some(record))
            }
            ExecutionEvent::Cancelled { intent, at, .. } => {
                let position = self.active_mut(&market_id)?;
                match intent {
                    OrderIntent::Entry => {
                        position.cancel(*at)?;
                        self.retire(&market_id);
                        info!(market = %market_id, "Entry cancelled");
                    }
                    OrderIntent::TakeProfit | OrderIntent::StopLoss => {
                        position.abort_exit()?;
                        warn!(market = %market_id, ?intent, "Exit order withdrawn, position open again");
                    }
                }
                Ok(None)
            }
            ExecutionEvent::Rejected { intent, reason, .. } => {
                let position = self.active_mut(&market_id)?;
                position.failed_confirmations += 1;
                position.retry_pending = true;
                warn!(
                    market = %market_id,
                    ?intent,
                    status = %position.status,
                    attempts = position.failed_confirmations,
                    reason = %reason,
                    "Order rejected, position left in place"
                );
                Ok(None)
            }
        }
    }

    /// Re-issue or give up on a rejected order for the snapshot's market
    ///
    /// A rejected order is re-sent once per snapshot until it has been
    /// rejected more than `max_retries` times. After that a pending entry is
    /// cancelled and an exiting position returns to Open, so the strategy
    /// decides afresh. A re-sent stop-loss is priced off the current snapshot.
    pub fn retry_rejected(
        &mut self,
        snapshot: &Snapshot,
        max_retries: u32,
    ) -> Result<Option<RetryDecision>> {
        let market_id = snapshot.market_id.as_str();
        let Some(position) = self.positions.get_mut(market_id) else {
            return Ok(None);
        };
        if !position.retry_pending {
            return Ok(None);
        }
        position.retry_pending = false;
        let attempts = position.failed_confirmations;

        if attempts > max_retries {
            match position.status {
                PositionStatus::Pending => {
                    position.cancel(snapshot.observed_at)?;
                    self.retire(market_id);
                    warn!(market = market_id, attempts, "Entry abandoned after repeated rejections");
                }
                PositionStatus::Exiting => {
                    position.abort_exit()?;
                    position.failed_confirmations = 0;
                    warn!(
                        market = market_id,
                        attempts,
                        "Exit abandoned after repeated rejections, position open again"
                    );
                }
                _ => return Ok(None),
            }
            return Ok(Some(RetryDecision::RolledBack));
        }

        let shares = position.shares;
        let request = match (position.status, position.pending_exit) {
            (PositionStatus::Pending, _) => OrderRequest::PlaceMakerBuy {
                market_id: market_id.to_string(),
                price: position.entry_price,
                shares,
            },
            (PositionStatus::Exiting, Some(ExitReason::TakeProfit)) => OrderRequest::PlaceMakerSell {
                market_id: market_id.to_string(),
                price: self.tier.take_profit_price,
                shares,
            },
            (PositionStatus::Exiting, Some(ExitReason::StopLoss)) => OrderRequest::PlaceTakerSell {
                market_id: market_id.to_string(),
                price: self.tier.stop_exit_price(snapshot.yes_price),
                shares,
            },
            _ => return Ok(None),
        };
        info!(market = market_id, attempt = attempts, intent = ?request.intent(), "Re-sending rejected order");
        Ok(Some(RetryDecision::Resend(request)))
    }

    /// Close the market's position at its settlement value if it resolved
    ///
    /// A pending entry on a resolved market can never fill; it is cancelled
    /// and the returned request withdraws the resting buy. Calling this again
    /// for the same market is a no-op.
    pub fn settle(&mut self, snapshot: &Snapshot) -> Result<Option<Settlement>> {
        let Some(value) = snapshot.resolution.settlement_value() else {
            return Ok(None);
        };
        let market_id = snapshot.market_id.as_str();
        let Some(position) = self.positions.get_mut(market_id) else {
            return Ok(None);
        };

        if position.status == PositionStatus::Pending {
            position.cancel(snapshot.observed_at)?;
            self.retire(market_id);
            info!(market = market_id, "Market resolved before entry filled, entry cancelled");
            return Ok(Some(Settlement::EntryCancelled(OrderRequest::CancelOrder {
                market_id: market_id.to_string(),
                intent: OrderIntent::Entry,
            })));
        }

        let record = position.settle(value, snapshot.observed_at)?;
        self.retire(market_id);
        info!(
            market = market_id,
            resolution = %snapshot.resolution,
            pnl = %record.realized_pnl,
            "Position settled at resolution"
        );
        Ok(Some(Settlement::Closed(record)))
    }

    /// Cancel every pending entry; open positions are left untouched
    pub fn shutdown(&mut self, at: DateTime<Utc>) -> Vec<OrderRequest> {
        let pending: Vec<MarketId> = self
            .positions
            .values()
            .filter(|p| p.status == PositionStatus::Pending)
            .map(|p| p.market_id.clone())
            .collect();

        let mut requests = Vec::with_capacity(pending.len());
        for market_id in pending {
            if let Some(position) = self.positions.get_mut(&market_id) {
                if position.cancel(at).is_ok() {
                    requests.push(OrderRequest::CancelOrder {
                        market_id: market_id.clone(),
                        intent: OrderIntent::Entry,
                    });
                    self.retire(&market_id);
                }
            }
        }
        info!(
            cancelled = requests.len(),
            remaining = self.positions.len(),
            "Shutdown: pending entries cancelled, open positions kept"
        );
        requests
    }
}
