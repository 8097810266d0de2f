//! Position state machine and the trade records it produces

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::errors::{EngineError, Result};
use crate::common::types::{MarketId, Snapshot};

/// Lifecycle state of a position
///
/// ```text
/// Pending ──fill──▶ Open ──exit decided──▶ Exiting ──fill──▶ Closed
///    │                 └──────────resolution──────────────▶ Closed
///    └──cancel──▶ Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    Pending,
    Open,
    Exiting,
    Closed,
    Cancelled,
}

impl PositionStatus {
    /// Occupies a slot in the portfolio (counts toward capacity caps)
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PositionStatus::Pending | PositionStatus::Open | PositionStatus::Exiting
        )
    }
}

impl std::fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionStatus::Pending => write!(f, "pending"),
            PositionStatus::Open => write!(f, "open"),
            PositionStatus::Exiting => write!(f, "exiting"),
            PositionStatus::Closed => write!(f, "closed"),
            PositionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Why a position was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    ResolutionSettlement,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::TakeProfit => write!(f, "take-profit"),
            ExitReason::StopLoss => write!(f, "stop-loss"),
            ExitReason::ResolutionSettlement => write!(f, "resolution-settlement"),
        }
    }
}

/// Capital committed to one market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub market_id: MarketId,
    pub category: String,
    /// Tier that qualified the entry
    pub tier: String,
    /// Limit price while pending, fill price once open
    pub entry_price: Decimal,
    /// When the entry was decided
    pub opened_at: DateTime<Utc>,
    /// When the entry filled
    pub entry_time: Option<DateTime<Utc>>,
    /// Fixed USD notional
    pub notional: Decimal,
    /// Share count, fixed when the entry order is sized
    pub shares: Decimal,
    pub status: PositionStatus,
    /// Consecutive observations below the hard stop
    pub stop_breach_count: u32,
    /// Exit reason carried from the exit decision to the exit fill
    pub pending_exit: Option<ExitReason>,
    pub exit_price: Option<Decimal>,
    pub exit_time: Option<DateTime<Utc>>,
    pub exit_reason: Option<ExitReason>,
    pub fees_paid: Decimal,
    /// Rejections of the order currently in flight
    pub failed_confirmations: u32,
    /// The in-flight order was rejected and has not been re-sent yet
    #[serde(default)]
    pub retry_pending: bool,
}

impl Position {
    /// Create a pending position for an entry decided on `snapshot`
    pub fn pending(snapshot: &Snapshot, tier: &str, limit_price: Decimal, notional: Decimal) -> Self {
        let shares = if limit_price.is_zero() {
            Decimal::ZERO
        } else {
            notional / limit_price
        };
        Self {
            market_id: snapshot.market_id.clone(),
            category: snapshot.category.clone(),
            tier: tier.to_string(),
            entry_price: limit_price,
            opened_at: snapshot.observed_at,
            entry_time: None,
            notional,
            shares,
            status: PositionStatus::Pending,
            stop_breach_count: 0,
            pending_exit: None,
            exit_price: None,
            exit_time: None,
            exit_reason: None,
            fees_paid: Decimal::ZERO,
            failed_confirmations: 0,
            retry_pending: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    fn transition_error(&self, to: &str) -> EngineError {
        EngineError::InvalidTransition {
            market_id: self.market_id.clone(),
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }

    /// Pending -> Open
    pub fn confirm_entry(&mut self, fill_price: Decimal, fee: Decimal, at: DateTime<Utc>) -> Result<()> {
        if self.status != PositionStatus::Pending {
            return Err(self.transition_error("open"));
        }
        self.entry_price = fill_price;
        self.entry_time = Some(at);
        self.fees_paid += fee;
        self.status = PositionStatus::Open;
        Ok(())
    }

    /// Pending -> Cancelled
    pub fn cancel(&mut self, at: DateTime<Utc>) -> Result<()> {
        if self.status != PositionStatus::Pending {
            return Err(self.transition_error("cancelled"));
        }
        self.exit_time = Some(at);
        self.status = PositionStatus::Cancelled;
        Ok(())
    }

    /// Open -> Exiting
    pub fn begin_exit(&mut self, reason: ExitReason) -> Result<()> {
        if self.status != PositionStatus::Open || reason == ExitReason::ResolutionSettlement {
            return Err(self.transition_error("exiting"));
        }
        self.pending_exit = Some(reason);
        self.failed_confirmations = 0;
        self.retry_pending = false;
        self.status = PositionStatus::Exiting;
        Ok(())
    }

    /// Exiting -> Open when the exit order is withdrawn before filling
    pub fn abort_exit(&mut self) -> Result<()> {
        if self.status != PositionStatus::Exiting {
            return Err(self.transition_error("open"));
        }
        self.pending_exit = None;
        self.stop_breach_count = 0;
        self.retry_pending = false;
        self.status = PositionStatus::Open;
        Ok(())
    }

    /// Exiting -> Closed on an exit fill
    pub fn confirm_exit(&mut self, fill_price: Decimal, fee: Decimal, at: DateTime<Utc>) -> Result<TradeRecord> {
        let reason = match (self.status, self.pending_exit) {
            (PositionStatus::Exiting, Some(reason)) => reason,
            _ => return Err(self.transition_error("closed")),
        };
        self.close(fill_price, fee, at, reason)
    }

    /// Open/Exiting -> Closed at the settlement value
    pub fn settle(&mut self, settlement_value: Decimal, at: DateTime<Utc>) -> Result<TradeRecord> {
        if !matches!(self.status, PositionStatus::Open | PositionStatus::Exiting) {
            return Err(self.transition_error("closed"));
        }
        self.close(settlement_value, Decimal::ZERO, at, ExitReason::ResolutionSettlement)
    }

    fn close(
        &mut self,
        exit_price: Decimal,
        fee: Decimal,
        at: DateTime<Utc>,
        reason: ExitReason,
    ) -> Result<TradeRecord> {
        self.fees_paid += fee;
        self.exit_price = Some(exit_price);
        self.exit_time = Some(at);
        self.exit_reason = Some(reason);
        self.pending_exit = None;
        self.status = PositionStatus::Closed;
        TradeRecord::from_closed(self)
    }

    /// Track consecutive observations below the stop while open
    pub fn record_observation(&mut self, price: Decimal, stop_price: Decimal) {
        if self.status != PositionStatus::Open {
            return;
        }
        if price < stop_price {
            self.stop_breach_count = self.stop_breach_count.saturating_add(1);
        } else {
            self.stop_breach_count = 0;
        }
    }

    /// Realized P&L net of fees, zero until closed
    pub fn realized_pnl(&self) -> Decimal {
        match self.exit_price {
            Some(exit) => (exit - self.entry_price) * self.shares - self.fees_paid,
            None => Decimal::ZERO,
        }
    }
}

/// Immutable result of a closed position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub market_id: MarketId,
    pub category: String,
    pub tier: String,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    /// Share count
    pub size: Decimal,
    pub notional: Decimal,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub holding_seconds: i64,
    pub exit_reason: ExitReason,
    pub fees: Decimal,
    pub realized_pnl: Decimal,
}

impl TradeRecord {
    fn from_closed(position: &Position) -> Result<Self> {
        match (
            position.status,
            position.exit_price,
            position.exit_time,
            position.exit_reason,
        ) {
            (PositionStatus::Closed, Some(exit_price), Some(exit_time), Some(exit_reason)) => {
                let entry_time = position.entry_time.unwrap_or(position.opened_at);
                Ok(Self {
                    market_id: position.market_id.clone(),
                    category: position.category.clone(),
                    tier: position.tier.clone(),
                    entry_price: position.entry_price,
                    exit_price,
                    size: position.shares,
                    notional: position.notional,
                    entry_time,
                    exit_time,
                    holding_seconds: (exit_time - entry_time).num_seconds(),
                    exit_reason,
                    fees: position.fees_paid,
                    realized_pnl: position.realized_pnl(),
                })
            }
            _ => Err(EngineError::InvariantViolation(format!(
                "trade record requested for non-closed position {}",
                position.market_id
            ))),
        }
    }

    /// Flat trades count as losses
    pub fn is_win(&self) -> bool {
        self.realized_pnl > Decimal::ZERO
    }

    pub fn holding_hours(&self) -> Decimal {
        Decimal::from(self.holding_seconds) / Decimal::from(3600)
    }

    /// Cash returned to the portfolio when the position closed
    pub fn proceeds(&self) -> Decimal {
        self.notional + self.realized_pnl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::Resolution;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn snapshot() -> Snapshot {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Snapshot::new("m1", "sports", dec!(0.95), t0, t0 + Duration::hours(6), Resolution::Unresolved)
            .unwrap()
    }

    #[test]
    fn test_happy_path_take_profit() {
        let snap = snapshot();
        let mut pos = Position::pending(&snap, "TierA", dec!(0.95), dec!(50));
        assert_eq!(pos.status, PositionStatus::Pending);

        pos.confirm_entry(dec!(0.95), Decimal::ZERO, snap.observed_at).unwrap();
        pos.begin_exit(ExitReason::TakeProfit).unwrap();
        let record = pos
            .confirm_exit(dec!(0.99), Decimal::ZERO, snap.observed_at + Duration::hours(2))
            .unwrap();

        assert_eq!(pos.status, PositionStatus::Closed);
        assert_eq!(record.exit_reason, ExitReason::TakeProfit);
        assert_eq!(record.realized_pnl, (dec!(0.99) - dec!(0.95)) * pos.shares);
        assert_eq!(record.holding_seconds, 7200);
        assert!(record.is_win());
    }

    #[test]
    fn test_exit_requires_open() {
        let mut pos = Position::pending(&snapshot(), "TierA", dec!(0.95), dec!(50));
        assert!(matches!(
            pos.begin_exit(ExitReason::StopLoss),
            Err(EngineError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_cancel_only_from_pending() {
        let snap = snapshot();
        let mut pos = Position::pending(&snap, "TierA", dec!(0.95), dec!(50));
        pos.confirm_entry(dec!(0.95), Decimal::ZERO, snap.observed_at).unwrap();
        assert!(pos.cancel(snap.observed_at).is_err());
        assert_eq!(pos.status, PositionStatus::Open);
    }

    #[test]
    fn test_settle_twice_fails() {
        let snap = snapshot();
        let mut pos = Position::pending(&snap, "TierA", dec!(0.95), dec!(50));
        pos.confirm_entry(dec!(0.95), Decimal::ZERO, snap.observed_at).unwrap();
        let record = pos.settle(Decimal::ZERO, snap.resolves_at).unwrap();
        assert_eq!(record.exit_reason, ExitReason::ResolutionSettlement);
        assert_eq!(record.realized_pnl, -dec!(0.95) * pos.shares);
        assert!(pos.settle(Decimal::ZERO, snap.resolves_at).is_err());
    }

    #[test]
    fn test_breach_counter_resets_on_recovery() {
        let snap = snapshot();
        let mut pos = Position::pending(&snap, "TierA", dec!(0.95), dec!(50));
        pos.record_observation(dec!(0.80), dec!(0.85));
        assert_eq!(pos.stop_breach_count, 0, "pending positions are not monitored");

        pos.confirm_entry(dec!(0.95), Decimal::ZERO, snap.observed_at).unwrap();
        pos.record_observation(dec!(0.84), dec!(0.85));
        pos.record_observation(dec!(0.83), dec!(0.85));
        assert_eq!(pos.stop_breach_count, 2);
        pos.record_observation(dec!(0.90), dec!(0.85));
        assert_eq!(pos.stop_breach_count, 0);
    }
}
