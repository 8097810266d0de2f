//! Risk circuit breaker.
//!
//! Folds every closed trade into cumulative P&L and a consecutive-loss
//! streak, and halts new entries once a loss threshold is crossed. A halt
//! never touches open positions; they keep being evaluated for exits.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::types::{ResetPolicy, RiskConfig};
use crate::lifecycle::TradeRecord;

/// Why the breaker halted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    AbsoluteLoss,
    FractionalLoss,
    ConsecutiveLosses,
}

impl std::fmt::Display for HaltReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HaltReason::AbsoluteLoss => write!(f, "absolute loss limit"),
            HaltReason::FractionalLoss => write!(f, "fractional loss limit"),
            HaltReason::ConsecutiveLosses => write!(f, "consecutive loss limit"),
        }
    }
}

/// Read-only risk context consumed by the decision core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskState {
    /// Cumulative realized P&L since start
    pub realized_pnl: Decimal,
    pub consecutive_losses: u32,
    pub total_trades: u64,
    pub halted: bool,
    pub halted_at: Option<DateTime<Utc>>,
    pub halt_reason: Option<HaltReason>,
}

impl RiskState {
    /// Human-readable risk status
    pub fn status_text(&self) -> String {
        let status = if self.halted { "HALTED" } else { "OK" };
        format!(
            "Risk[{}] pnl=${} trades={} consec_losses={}",
            status,
            self.realized_pnl.round_dp(2),
            self.total_trades,
            self.consecutive_losses
        )
    }
}

/// Circuit breaker gating new entries.
///
/// Single writer: only closed trades (via [`CircuitBreaker::record`]) and
/// explicit resets mutate the state.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: RiskConfig,
    initial_capital: Decimal,
    state: RiskState,
}

impl CircuitBreaker {
    pub fn new(config: RiskConfig, initial_capital: Decimal) -> Self {
        Self {
            config,
            initial_capital,
            state: RiskState::default(),
        }
    }

    /// Resume from a previously persisted state.
    pub fn with_state(config: RiskConfig, initial_capital: Decimal, state: RiskState) -> Self {
        Self {
            config,
            initial_capital,
            state,
        }
    }

    pub fn state(&self) -> &RiskState {
        &self.state
    }

    pub fn is_halted(&self) -> bool {
        self.state.halted
    }

    pub fn initial_capital(&self) -> Decimal {
        self.initial_capital
    }

    /// Fold a closed trade into the risk state; returns true if this trade
    /// tripped the breaker.
    pub fn record(&mut self, trade: &TradeRecord) -> bool {
        self.state.realized_pnl += trade.realized_pnl;
        self.state.total_trades += 1;

        if trade.is_win() {
            self.state.consecutive_losses = 0;
        } else {
            self.state.consecutive_losses += 1;
        }

        if self.state.halted {
            return false;
        }

        match self.check_thresholds() {
            Some(reason) => {
                self.state.halted = true;
                self.state.halted_at = Some(trade.exit_time);
                self.state.halt_reason = Some(reason);
                warn!(
                    reason = %reason,
                    pnl = %self.state.realized_pnl,
                    consecutive_losses = self.state.consecutive_losses,
                    "Circuit breaker tripped, new entries halted"
                );
                true
            }
            None => false,
        }
    }

    fn check_thresholds(&self) -> Option<HaltReason> {
        let pnl = self.state.realized_pnl;

        if pnl <= -self.config.risk_halt_absolute_loss_usd {
            return Some(HaltReason::AbsoluteLoss);
        }

        if pnl < Decimal::ZERO && self.initial_capital > Decimal::ZERO {
            let loss_fraction = pnl.abs() / self.initial_capital;
            if loss_fraction >= self.config.risk_halt_fractional_loss {
                return Some(HaltReason::FractionalLoss);
            }
        }

        if self.state.consecutive_losses >= self.config.risk_halt_consecutive_losses {
            return Some(HaltReason::ConsecutiveLosses);
        }

        None
    }

    /// Apply the configured reset policy at time `now`.
    ///
    /// Under `Manual` this never un-halts, nor does a cooldown too long to
    /// represent. Returns true when the breaker resumed.
    pub fn poll(&mut self, now: DateTime<Utc>) -> bool {
        let ResetPolicy::Cooldown { hours } = self.config.reset_policy else {
            return false;
        };
        let resume_at = self
            .state
            .halted_at
            .filter(|_| self.state.halted)
            .and_then(|halted_at| halted_at.checked_add_signed(Duration::try_hours(hours)?));
        match resume_at {
            Some(resume_at) if now >= resume_at => {
                info!(cooldown_hours = hours, "Circuit breaker cooling period elapsed");
                self.reset();
                true
            }
            _ => false,
        }
    }

    /// Explicit external reset. Cumulative P&L is kept.
    pub fn reset(&mut self) {
        self.state.halted = false;
        self.state.halted_at = None;
        self.state.halt_reason = None;
        self.state.consecutive_losses = 0;
        info!("Circuit breaker reset");
    }
}
