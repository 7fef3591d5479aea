#![allow(dead_code)]
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Side, Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    MarketClose,
    Cancelled,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::StopLoss => "SL",
            ExitReason::TakeProfit => "TP",
            ExitReason::MarketClose => "MARKET_CLOSE",
            ExitReason::Cancelled => "CANCELLED",
        }
    }
}

/// A filled order tracked by the broker (simulated or live). Tickets are
/// sequential per run so replay output is reproducible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub ticket: u64,
    pub symbol: Symbol,
    pub side: Side,
    pub entry: Decimal,
    pub sl: Decimal,
    pub tp: Decimal,
    pub lots: Decimal,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub exit_price: Option<Decimal>,
    pub exit_reason: Option<ExitReason>,
    pub pnl: Option<Decimal>,
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }

    /// Signed mark-to-market value at `price`, excluding costs.
    pub fn unrealized_pnl(&self, price: Decimal) -> Decimal {
        (price - self.entry) * self.side.sign() * self.lots * self.symbol.contract_value()
    }

    /// Estimated loss if the stop is hit, always non-negative.
    pub fn risk_at_stop(&self) -> Decimal {
        (self.entry - self.sl).abs() * self.lots * self.symbol.contract_value()
    }
}
