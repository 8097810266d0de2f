use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::lifecycle::TradeRecord;

/// One sample of the equity curve, taken at each closed trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub at: DateTime<Utc>,
    pub cumulative_pnl: Decimal,
    pub equity: Decimal,
}

/// Append-only record of closed trades and the equity curve they trace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    initial_capital: Decimal,
    trades: Vec<TradeRecord>,
    equity_curve: Vec<EquityPoint>,
}

impl Ledger {
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            initial_capital,
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn push(&mut self, record: TradeRecord) {
        let cumulative_pnl = self.cumulative_pnl() + record.realized_pnl;
        self.equity_curve.push(EquityPoint {
            at: record.exit_time,
            cumulative_pnl,
            equity: self.initial_capital + cumulative_pnl,
        });
        self.trades.push(record);
    }

    pub fn initial_capital(&self) -> Decimal {
        self.initial_capital
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn cumulative_pnl(&self) -> Decimal {
        self.equity_curve
            .last()
            .map(|p| p.cumulative_pnl)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn into_parts(self) -> (Vec<TradeRecord>, Vec<EquityPoint>) {
        (self.trades, self.equity_curve)
    }
}
