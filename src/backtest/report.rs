//! Backtest output and the performance figures derived from it

use chrono::{Duration, NaiveDate};
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::Path;

use super::ledger::EquityPoint;
use crate::common::errors::Result;
use crate::lifecycle::{Position, TradeRecord};
use crate::risk::RiskState;

/// Annual risk-free rate used for Sharpe and Sortino
const RISK_FREE_RATE: Decimal = dec!(0.05);

/// Trade statistics for one group (tier, category or exit reason)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    pub count: usize,
    pub wins: usize,
    pub total_pnl: Decimal,
    pub total_fees: Decimal,
    pub total_holding_hours: Decimal,
}

impl GroupStats {
    fn add(&mut self, trade: &TradeRecord) {
        self.count += 1;
        if trade.is_win() {
            self.wins += 1;
        }
        self.total_pnl += trade.realized_pnl;
        self.total_fees += trade.fees;
        self.total_holding_hours += trade.holding_hours();
    }

    pub fn win_rate(&self) -> Decimal {
        ratio(Decimal::from(self.wins), self.count)
    }

    pub fn avg_pnl(&self) -> Decimal {
        ratio(self.total_pnl, self.count)
    }

    pub fn avg_holding_hours(&self) -> Decimal {
        ratio(self.total_holding_hours, self.count)
    }
}

fn ratio(total: Decimal, count: usize) -> Decimal {
    if count == 0 {
        Decimal::ZERO
    } else {
        total / Decimal::from(count)
    }
}

/// Aggregate performance of a replay
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub initial_capital: Decimal,
    pub final_equity: Decimal,
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    /// Fraction of trades with positive P&L
    pub win_rate: Decimal,
    pub total_pnl: Decimal,
    /// Total P&L as a fraction of initial capital
    pub total_return: Decimal,
    pub total_fees: Decimal,
    pub gross_profit: Decimal,
    pub gross_loss: Decimal,
    /// Mean P&L of winning trades
    pub avg_win: Decimal,
    /// Mean P&L of losing trades (zero or negative)
    pub avg_loss: Decimal,
    /// Gross profit over gross loss; `None` when there were no losing dollars
    pub profit_factor: Option<Decimal>,
    /// Largest peak-to-trough equity decline as a fraction of the peak
    pub max_drawdown: Decimal,
    pub avg_holding_hours: Decimal,
    /// Total return compounded to a 365-day year over the traded span
    pub annualized_return: Option<Decimal>,
    /// Annualized, over daily closing equity; `None` with fewer than two
    /// daily returns or no variation
    pub sharpe_ratio: Option<Decimal>,
    /// Like Sharpe but scaled by downside deviation only
    pub sortino_ratio: Option<Decimal>,
    pub by_tier: BTreeMap<String, GroupStats>,
    pub by_category: BTreeMap<String, GroupStats>,
    pub by_exit_reason: BTreeMap<String, GroupStats>,
}

impl PerformanceSummary {
    pub fn from_trades(trades: &[TradeRecord], initial_capital: Decimal) -> Self {
        let mut summary = Self {
            initial_capital,
            final_equity: initial_capital,
            ..Self::default()
        };
        if trades.is_empty() {
            return summary;
        }

        let mut equity = initial_capital;
        let mut peak = initial_capital;
        let mut holding_hours = Decimal::ZERO;

        for trade in trades {
            summary.total_trades += 1;
            summary.total_pnl += trade.realized_pnl;
            summary.total_fees += trade.fees;
            holding_hours += trade.holding_hours();

            if trade.is_win() {
                summary.wins += 1;
                summary.gross_profit += trade.realized_pnl;
            } else {
                summary.losses += 1;
                summary.gross_loss += trade.realized_pnl.abs();
            }

            summary
                .by_tier
                .entry(trade.tier.clone())
                .or_default()
                .add(trade);
            summary
                .by_category
                .entry(trade.category.clone())
                .or_default()
                .add(trade);
            summary
                .by_exit_reason
                .entry(trade.exit_reason.to_string())
                .or_default()
                .add(trade);

            equity += trade.realized_pnl;
            if equity > peak {
                peak = equity;
            }
            if peak > Decimal::ZERO {
                let drawdown = (peak - equity) / peak;
                if drawdown > summary.max_drawdown {
                    summary.max_drawdown = drawdown;
                }
            }
        }

        let count = Decimal::from(summary.total_trades);
        summary.final_equity = equity;
        summary.win_rate = Decimal::from(summary.wins) / count;
        summary.avg_holding_hours = holding_hours / count;
        summary.profit_factor = if summary.gross_loss.is_zero() {
            None
        } else {
            Some(summary.gross_profit / summary.gross_loss)
        };
        summary.avg_win = ratio(summary.gross_profit, summary.wins);
        summary.avg_loss = ratio(-summary.gross_loss, summary.losses);
        if initial_capital > Decimal::ZERO {
            summary.total_return = summary.total_pnl / initial_capital;
        }
        summary.annualized_return = annualized(summary.total_return, trades);

        let returns = daily_returns(trades, initial_capital);
        summary.sharpe_ratio = sharpe(&returns);
        summary.sortino_ratio = sortino(&returns);
        summary
    }

    /// Human-readable report for the terminal
    pub fn summary_text(&self) -> String {
        let rule = "=".repeat(60);
        let mut out = String::new();
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "  TAIL-END BACKTEST REPORT");
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out);
        let _ = writeln!(out, "--- Portfolio Summary ---");
        let _ = writeln!(out, "  Initial Capital:    ${:.2}", self.initial_capital);
        let _ = writeln!(out, "  Final Value:        ${:.2}", self.final_equity);
        let _ = writeln!(out, "  Total Return:       {}", percent(self.total_return));
        let _ = writeln!(out, "  Annualized Return:  {}", optional(self.annualized_return.map(percent)));
        let _ = writeln!(out, "  Max Drawdown:       {}", percent(self.max_drawdown));
        let _ = writeln!(out, "  Sharpe Ratio:       {}", optional(self.sharpe_ratio.map(two_dp)));
        let _ = writeln!(out, "  Sortino Ratio:      {}", optional(self.sortino_ratio.map(two_dp)));
        let _ = writeln!(out);
        let _ = writeln!(out, "--- Trade Summary ---");
        let _ = writeln!(out, "  Total Trades:       {}", self.total_trades);
        let _ = writeln!(out, "  Win Rate:           {}", percent(self.win_rate));
        let _ = writeln!(out, "  Avg Win:            ${:.2}", self.avg_win);
        let _ = writeln!(out, "  Avg Loss:           ${:.2}", self.avg_loss);
        let _ = writeln!(out, "  Profit Factor:      {}", optional(self.profit_factor.map(two_dp)));
        let _ = writeln!(out, "  Avg Holding:        {:.1} hours", self.avg_holding_hours);
        let _ = writeln!(out, "  Total Fees Paid:    ${:.2}", self.total_fees);

        for (title, groups) in [
            ("By Tier", &self.by_tier),
            ("By Exit Reason", &self.by_exit_reason),
            ("By Category", &self.by_category),
        ] {
            if groups.is_empty() {
                continue;
            }
            let _ = writeln!(out);
            let _ = writeln!(out, "--- {} ---", title);
            for (name, stats) in groups {
                let _ = writeln!(
                    out,
                    "  {:20} trades={:4}  winrate={}  pnl=${:.2}  avg_hold={:.1}h",
                    name,
                    stats.count,
                    percent(stats.win_rate()),
                    stats.total_pnl,
                    stats.avg_holding_hours()
                );
            }
        }
        let _ = writeln!(out);
        out.push_str(&rule);
        out
    }
}

fn percent(value: Decimal) -> String {
    format!("{:.2}%", value * Decimal::ONE_HUNDRED)
}

fn two_dp(value: Decimal) -> String {
    format!("{:.2}", value)
}

fn optional(value: Option<String>) -> String {
    value.unwrap_or_else(|| "n/a".to_string())
}

/// `(1 + total_return)^(365 / days) - 1`, with days spanning first entry to
/// last exit (at least one)
fn annualized(total_return: Decimal, trades: &[TradeRecord]) -> Option<Decimal> {
    let first = trades.iter().map(|t| t.entry_time).min()?;
    let last = trades.iter().map(|t| t.exit_time).max()?;
    let days = (last - first).num_days().max(1);
    let exponent = Decimal::from(365) / Decimal::from(days);
    (Decimal::ONE + total_return)
        .checked_powd(exponent)
        .map(|growth| growth - Decimal::ONE)
}

/// Day-over-day returns of closing equity, days without exits carried flat
fn daily_returns(trades: &[TradeRecord], initial_capital: Decimal) -> Vec<Decimal> {
    let mut closes: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    let mut equity = initial_capital;
    for trade in trades {
        equity += trade.realized_pnl;
        closes.insert(trade.exit_time.date_naive(), equity);
    }
    let (Some(&first), Some(&last)) = (closes.keys().next(), closes.keys().next_back()) else {
        return Vec::new();
    };

    let mut values = vec![initial_capital];
    let mut day = first;
    let mut close = initial_capital;
    while day <= last {
        if let Some(&value) = closes.get(&day) {
            close = value;
        }
        values.push(close);
        day += Duration::days(1);
    }

    values
        .windows(2)
        .filter(|w| w[0] > Decimal::ZERO)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

fn excess_returns(returns: &[Decimal]) -> Vec<Decimal> {
    let daily_rf = RISK_FREE_RATE / Decimal::from(365);
    returns.iter().map(|r| r - daily_rf).collect()
}

fn mean(values: &[Decimal]) -> Decimal {
    ratio(values.iter().sum(), values.len())
}

/// Sample standard deviation
fn std_dev(values: &[Decimal]) -> Option<Decimal> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let squares: Decimal = values.iter().map(|v| (v - m) * (v - m)).sum();
    (squares / Decimal::from(values.len() - 1)).sqrt()
}

fn annualize(excess: &[Decimal], deviation: Decimal) -> Option<Decimal> {
    if deviation.is_zero() {
        return None;
    }
    Some(Decimal::from(365).sqrt()? * mean(excess) / deviation)
}

fn sharpe(returns: &[Decimal]) -> Option<Decimal> {
    let excess = excess_returns(returns);
    annualize(&excess, std_dev(&excess)?)
}

fn sortino(returns: &[Decimal]) -> Option<Decimal> {
    if returns.len() < 2 {
        return None;
    }
    let excess = excess_returns(returns);
    let downside: Vec<Decimal> = excess.iter().copied().filter(|r| *r < Decimal::ZERO).collect();
    annualize(&excess, std_dev(&downside)?)
}

/// Everything a replay produces, handed to external reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub strategy: String,
    pub snapshots_processed: usize,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
    /// Positions still active when the data ran out
    pub open_positions: Vec<Position>,
    pub risk: RiskState,
    pub summary: PerformanceSummary,
}

impl BacktestReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::ExitReason;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn trade(category: &str, pnl: Decimal, fees: Decimal, reason: ExitReason) -> TradeRecord {
        let t = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        TradeRecord {
            market_id: "m".to_string(),
            category: category.to_string(),
            tier: "TierA".to_string(),
            entry_price: dec!(0.95),
            exit_price: dec!(0.99),
            size: dec!(50),
            notional: dec!(47.5),
            entry_time: t,
            exit_time: t + Duration::hours(3),
            holding_seconds: 3 * 3600,
            exit_reason: reason,
            fees,
            realized_pnl: pnl,
        }
    }

    #[test]
    fn test_empty_summary() {
        let summary = PerformanceSummary::from_trades(&[], dec!(1000));
        assert_eq!(summary.total_trades, 0);
        assert_eq!(summary.final_equity, dec!(1000));
        assert_eq!(summary.profit_factor, None);
    }

    #[test]
    fn test_summary_figures() {
        let trades = vec![
            trade("sports", dec!(20), dec!(0), ExitReason::TakeProfit),
            trade("sports", dec!(-10), dec!(0.5), ExitReason::StopLoss),
            trade("crypto", dec!(-10), dec!(0), ExitReason::ResolutionSettlement),
            trade("crypto", dec!(5), dec!(0), ExitReason::TakeProfit),
        ];
        let summary = PerformanceSummary::from_trades(&trades, dec!(100));

        assert_eq!(summary.total_trades, 4);
        assert_eq!(summary.wins, 2);
        assert_eq!(summary.win_rate, dec!(0.5));
        assert_eq!(summary.total_pnl, dec!(5));
        assert_eq!(summary.final_equity, dec!(105));
        assert_eq!(summary.total_fees, dec!(0.5));
        assert_eq!(summary.profit_factor, Some(dec!(1.25)));
        assert_eq!(summary.avg_holding_hours, dec!(3));
        // peak 120 -> trough 100
        assert_eq!(summary.max_drawdown, dec!(20) / dec!(120));
        assert_eq!(summary.by_category["crypto"].count, 2);
        assert_eq!(summary.by_exit_reason["take-profit"].total_pnl, dec!(25));
        assert_eq!(summary.avg_win, dec!(12.5));
        assert_eq!(summary.avg_loss, dec!(-10));
        assert_eq!(summary.by_tier["TierA"].count, 4);
        assert_eq!(summary.by_tier["TierA"].win_rate(), dec!(0.5));
        assert!(summary.annualized_return.is_some());
        // every exit on one day: a single daily return
        assert_eq!(summary.sharpe_ratio, None);
        assert_eq!(summary.sortino_ratio, None);

        let text = summary.summary_text();
        assert!(text.contains("Total Trades:       4"));
        assert!(text.contains("Win Rate:           50.00%"));
        assert!(text.contains("--- By Tier ---"));
    }

    fn trade_on_day(day: i64, pnl: Decimal) -> TradeRecord {
        let mut t = trade("sports", pnl, Decimal::ZERO, ExitReason::TakeProfit);
        t.entry_time += Duration::days(day);
        t.exit_time += Duration::days(day);
        t
    }

    #[test]
    fn test_risk_adjusted_ratios() {
        let trades = vec![
            trade_on_day(0, dec!(10)),
            trade_on_day(1, dec!(-5)),
            trade_on_day(2, dec!(10)),
            trade_on_day(3, dec!(-5)),
        ];
        let summary = PerformanceSummary::from_trades(&trades, dec!(100));

        let sharpe = summary.sharpe_ratio.expect("four daily returns");
        let sortino = summary.sortino_ratio.expect("two losing days");
        assert!(sharpe > Decimal::ZERO);
        assert!(sortino > sharpe);
    }

    #[test]
    fn test_annualized_return_over_a_year() {
        let mut late = trade("sports", dec!(10), Decimal::ZERO, ExitReason::TakeProfit);
        late.exit_time = late.entry_time + Duration::days(365);
        let summary = PerformanceSummary::from_trades(&[late], dec!(100));
        assert_eq!(summary.annualized_return.map(|r| r.round_dp(8)), Some(dec!(0.1)));
    }
}
