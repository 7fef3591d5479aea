#![allow(dead_code)]
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use crate::news::GuardrailMode;
use crate::types::{Decision, Position, Symbol};

/// Point on the equity curve, sampled at each processed candle close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub symbol: Symbol,
    pub equity: Decimal,
    pub balance: Decimal,
}

/// One record per evaluation tick, appended to the decision log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub ts: DateTime<Utc>,
    pub symbol: Symbol,
    pub strategy: String,
    pub guardrail: String,
    pub decision: Decision,
}

impl DecisionRecord {
    pub fn new(
        ts: DateTime<Utc>,
        symbol: Symbol,
        strategy: &str,
        guardrail: GuardrailMode,
        decision: Decision,
    ) -> Self {
        Self {
            ts,
            symbol,
            strategy: strategy.to_string(),
            guardrail: guardrail.as_str().to_string(),
            decision,
        }
    }
}

/// Observability counters surfaced in the run report.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunCounters {
    pub ticks: u64,
    pub no_signal: u64,
    pub skips: u64,
    pub proposals: u64,
    pub submissions: u64,
    pub bias_anchor_missing: u64,
    pub swing_underflow: u64,
    pub buffer_empty: u64,
    pub decision_log_drops: u64,
}

/// Aggregate statistics over the closed trades of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaySummary {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub initial_balance: Decimal,
    pub final_balance: Decimal,
    pub final_equity: Decimal,
    pub net_profit: Decimal,
    pub total_trades: u64,
    pub winning_trades: u64,
    pub losing_trades: u64,
    pub win_rate_pct: Decimal,
    pub profit_factor: Decimal,
    pub gross_profit: Decimal,
    pub gross_loss: Decimal,
    pub average_win: Decimal,
    pub average_loss: Decimal,
    pub largest_win: Decimal,
    pub largest_loss: Decimal,
    pub max_drawdown_pct: Decimal,
    pub symbol_stats: BTreeMap<Symbol, SymbolStats>,
    pub counters: RunCounters,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SymbolStats {
    pub trades: u64,
    pub wins: u64,
    pub losses: u64,
    pub net_pnl: Decimal,
    pub win_rate_pct: Decimal,
}

impl SymbolStats {
    fn add(&mut self, pnl: Decimal) {
        self.trades += 1;
        self.net_pnl += pnl;
        if pnl > Decimal::ZERO {
            self.wins += 1;
        } else if pnl < Decimal::ZERO {
            self.losses += 1;
        }
        if self.trades > 0 {
            self.win_rate_pct = Decimal::from(self.wins) / Decimal::from(self.trades) * dec!(100);
        }
    }
}

/// Full output of a replay run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayReport {
    pub summary: ReplaySummary,
    pub trades: Vec<Position>,
    pub equity: Vec<EquityPoint>,
    pub decisions: Vec<DecisionRecord>,
}

impl ReplayReport {
    pub fn build(
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        initial_balance: Decimal,
        final_balance: Decimal,
        trades: Vec<Position>,
        equity: Vec<EquityPoint>,
        decisions: Vec<DecisionRecord>,
        counters: RunCounters,
        cancelled: bool,
    ) -> Self {
        let mut gross_profit = Decimal::ZERO;
        let mut gross_loss = Decimal::ZERO;
        let mut winning = 0u64;
        let mut losing = 0u64;
        let mut largest_win = Decimal::ZERO;
        let mut largest_loss = Decimal::ZERO;
        let mut symbol_stats: BTreeMap<Symbol, SymbolStats> = BTreeMap::new();

        for trade in &trades {
            let pnl = trade.pnl.unwrap_or(Decimal::ZERO);
            symbol_stats.entry(trade.symbol).or_default().add(pnl);
            if pnl > Decimal::ZERO {
                winning += 1;
                gross_profit += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < Decimal::ZERO {
                losing += 1;
                gross_loss += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            }
        }

        let total = trades.len() as u64;
        let win_rate_pct = if total > 0 {
            Decimal::from(winning) / Decimal::from(total) * dec!(100)
        } else {
            Decimal::ZERO
        };
        let profit_factor = if !gross_loss.is_zero() {
            gross_profit / gross_loss
        } else if gross_profit > Decimal::ZERO {
            dec!(100)
        } else {
            Decimal::ZERO
        };
        let average_win = if winning > 0 {
            gross_profit / Decimal::from(winning)
        } else {
            Decimal::ZERO
        };
        let average_loss = if losing > 0 {
            gross_loss / Decimal::from(losing)
        } else {
            Decimal::ZERO
        };

        let mut peak = initial_balance;
        let mut max_drawdown_pct = Decimal::ZERO;
        for point in &equity {
            peak = peak.max(point.equity);
            if peak > Decimal::ZERO {
                let dd = (peak - point.equity) / peak * dec!(100);
                max_drawdown_pct = max_drawdown_pct.max(dd);
            }
        }

        let final_equity = equity
            .last()
            .map(|p| p.equity)
            .unwrap_or(final_balance);

        ReplayReport {
            summary: ReplaySummary {
                from,
                to,
                initial_balance,
                final_balance,
                final_equity,
                net_profit: final_balance - initial_balance,
                total_trades: total,
                winning_trades: winning,
                losing_trades: losing,
                win_rate_pct,
                profit_factor,
                gross_profit,
                gross_loss,
                average_win,
                average_loss,
                largest_win,
                largest_loss,
                max_drawdown_pct,
                symbol_stats,
                counters,
                cancelled,
            },
            trades,
            equity,
            decisions,
        }
    }

    /// Write `summary.json`, `trades.csv`, `equity.csv` and
    /// `decisions.jsonl` into `dir`.
    pub fn write_outputs(&self, dir: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(dir)?;

        let summary = serde_json::to_string_pretty(&self.summary)?;
        std::fs::write(dir.join("summary.json"), summary)?;

        let mut trades = csv::Writer::from_path(dir.join("trades.csv"))?;
        trades.write_record([
            "ticket",
            "symbol",
            "side",
            "entry",
            "sl",
            "tp",
            "lots",
            "opened_at",
            "closed_at",
            "exit_price",
            "exit_reason",
            "pnl",
        ])?;
        for t in &self.trades {
            trades.write_record([
                t.ticket.to_string(),
                t.symbol.to_string(),
                t.side.to_string(),
                t.entry.to_string(),
                t.sl.to_string(),
                t.tp.to_string(),
                t.lots.to_string(),
                t.opened_at.to_rfc3339(),
                t.closed_at.map(|c| c.to_rfc3339()).unwrap_or_default(),
                t.exit_price.map(|p| p.to_string()).unwrap_or_default(),
                t.exit_reason.map(|r| r.as_str().to_string()).unwrap_or_default(),
                t.pnl.map(|p| p.to_string()).unwrap_or_default(),
            ])?;
        }
        trades.flush()?;

        let mut equity = csv::Writer::from_path(dir.join("equity.csv"))?;
        equity.write_record(["timestamp", "symbol", "equity", "balance"])?;
        for p in &self.equity {
            equity.write_record([
                p.timestamp.to_rfc3339(),
                p.symbol.to_string(),
                p.equity.to_string(),
                p.balance.to_string(),
            ])?;
        }
        equity.flush()?;

        let mut decisions = std::fs::File::create(dir.join("decisions.jsonl"))?;
        for record in &self.decisions {
            serde_json::to_writer(&mut decisions, record)?;
            decisions.write_all(b"\n")?;
        }
        decisions.flush()?;

        Ok(())
    }

    /// Console summary in the shape operators expect.
    pub fn print_summary(&self) {
        let s = &self.summary;
        println!("{}", "=".repeat(56));
        println!("                 REPLAY RESULTS");
        println!("{}", "=".repeat(56));
        println!("Period:           {} to {}", s.from, s.to);
        println!("Initial Balance:  {:.2}", s.initial_balance);
        println!("Final Balance:    {:.2}", s.final_balance);
        println!("Net Profit:       {:.2}", s.net_profit);
        println!("Max Drawdown:     {:.2}%", s.max_drawdown_pct);
        println!("{}", "-".repeat(56));
        println!("Trades:           {}", s.total_trades);
        println!(
            "Wins/Losses:      {}/{} ({:.1}%)",
            s.winning_trades, s.losing_trades, s.win_rate_pct
        );
        println!("Profit Factor:    {:.2}", s.profit_factor);
        println!("Avg Win/Loss:     {:.2} / {:.2}", s.average_win, s.average_loss);
        println!("{}", "-".repeat(56));
        println!(
            "Ticks: {}  Proposals: {}  Skips: {}  NoSignal: {}",
            s.counters.ticks, s.counters.proposals, s.counters.skips, s.counters.no_signal
        );
        for (symbol, stats) in &s.symbol_stats {
            println!(
                "  {}: {} trades, {:.1}% win rate, {:.2} net",
                symbol, stats.trades, stats.win_rate_pct, stats.net_pnl
            );
        }
        if s.cancelled {
            println!("NOTE: run was cancelled; results are partial");
        }
        println!("{}", "=".repeat(56));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_util::minute;
    use crate::types::{ExitReason, Side};

    fn closed(ticket: u64, pnl: Decimal) -> Position {
        Position {
            ticket,
            symbol: Symbol::XAUUSD,
            side: Side::Buy,
            entry: dec!(2002),
            sl: dec!(1999.5),
            tp: dec!(2009.5),
            lots: dec!(0.1),
            opened_at: minute(0),
            closed_at: Some(minute(10)),
            exit_price: Some(dec!(2009.5)),
            exit_reason: Some(ExitReason::TakeProfit),
            pnl: Some(pnl),
        }
    }

    #[test]
    fn summary_statistics_aggregate_trades() {
        let trades = vec![closed(1, dec!(75)), closed(2, dec!(-25)), closed(3, dec!(50))];
        let report = ReplayReport::build(
            minute(0),
            minute(100),
            dec!(10000),
            dec!(10100),
            trades,
            vec![],
            vec![],
            RunCounters::default(),
            false,
        );
        let s = &report.summary;
        assert_eq!(s.total_trades, 3);
        assert_eq!(s.winning_trades, 2);
        assert_eq!(s.losing_trades, 1);
        assert_eq!(s.gross_profit, dec!(125));
        assert_eq!(s.gross_loss, dec!(25));
        assert_eq!(s.profit_factor, dec!(5));
        assert_eq!(s.largest_win, dec!(75));
        assert_eq!(s.net_profit, dec!(100));
    }

    #[test]
    fn drawdown_tracks_the_equity_peak() {
        let equity = vec![
            EquityPoint {
                timestamp: minute(0),
                symbol: Symbol::XAUUSD,
                equity: dec!(10000),
                balance: dec!(10000),
            },
            EquityPoint {
                timestamp: minute(1),
                symbol: Symbol::XAUUSD,
                equity: dec!(11000),
                balance: dec!(10000),
            },
            EquityPoint {
                timestamp: minute(2),
                symbol: Symbol::XAUUSD,
                equity: dec!(9900),
                balance: dec!(10000),
            },
        ];
        let report = ReplayReport::build(
            minute(0),
            minute(2),
            dec!(10000),
            dec!(10000),
            vec![],
            equity,
            vec![],
            RunCounters::default(),
            false,
        );
        assert_eq!(report.summary.max_drawdown_pct, dec!(10));
    }

    #[test]
    fn outputs_land_in_the_run_directory() {
        let dir = tempfile::tempdir().unwrap();
        let report = ReplayReport::build(
            minute(0),
            minute(1),
            dec!(10000),
            dec!(10000),
            vec![closed(1, dec!(75))],
            vec![],
            vec![],
            RunCounters::default(),
            false,
        );
        report.write_outputs(dir.path()).unwrap();
        assert!(dir.path().join("summary.json").exists());
        assert!(dir.path().join("trades.csv").exists());
        assert!(dir.path().join("equity.csv").exists());
        assert!(dir.path().join("decisions.jsonl").exists());
    }
}
