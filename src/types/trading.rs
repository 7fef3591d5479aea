#![allow(dead_code)]
use chrono::{DateTime, Timelike, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Variants are declared alphabetically so the derived ordering matches the
/// lexicographic tie-break the replay scheduler sorts by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Symbol {
    BTCUSD,
    EURUSD,
    GBPUSD,
    USDJPY,
    XAUUSD,
}

impl Symbol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Symbol::BTCUSD => "BTCUSD",
            Symbol::EURUSD => "EURUSD",
            Symbol::GBPUSD => "GBPUSD",
            Symbol::USDJPY => "USDJPY",
            Symbol::XAUUSD => "XAUUSD",
        }
    }

    pub fn all() -> Vec<Symbol> {
        vec![
            Symbol::BTCUSD,
            Symbol::EURUSD,
            Symbol::GBPUSD,
            Symbol::USDJPY,
            Symbol::XAUUSD,
        ]
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "XAUUSD" | "GOLD" => Some(Symbol::XAUUSD),
            "EURUSD" => Some(Symbol::EURUSD),
            "GBPUSD" => Some(Symbol::GBPUSD),
            "USDJPY" => Some(Symbol::USDJPY),
            "BTCUSD" => Some(Symbol::BTCUSD),
            _ => None,
        }
    }

    /// Smallest meaningful price increment used for symbol-scaled buffers.
    pub fn pip(&self) -> Decimal {
        match self {
            Symbol::XAUUSD => dec!(0.1),
            Symbol::EURUSD | Symbol::GBPUSD => dec!(0.0001),
            Symbol::USDJPY => dec!(0.01),
            Symbol::BTCUSD => dec!(1.0),
        }
    }

    /// Minimum entry-to-stop distance for a proposal to be valid.
    pub fn min_risk_distance(&self) -> Decimal {
        match self {
            Symbol::XAUUSD => dec!(1.0),
            Symbol::EURUSD | Symbol::GBPUSD => dec!(0.0001),
            Symbol::USDJPY => dec!(0.01),
            Symbol::BTCUSD => dec!(50),
        }
    }

    /// Minimum gap size for a fair value gap to register.
    pub fn min_fvg_size(&self) -> Decimal {
        match self {
            Symbol::XAUUSD => dec!(0.5),
            Symbol::EURUSD | Symbol::GBPUSD => dec!(0.0002),
            Symbol::USDJPY => dec!(0.02),
            Symbol::BTCUSD => dec!(25),
        }
    }

    /// Tolerance when testing whether a wick swept a prior swing.
    pub fn sweep_tolerance(&self) -> Decimal {
        match self {
            Symbol::XAUUSD => dec!(0.3),
            Symbol::EURUSD | Symbol::GBPUSD => dec!(0.0001),
            Symbol::USDJPY => dec!(0.01),
            Symbol::BTCUSD => dec!(10),
        }
    }

    /// Default stop-loss buffer beyond the protective structure.
    pub fn sl_buffer(&self) -> Decimal {
        match self {
            Symbol::XAUUSD => dec!(1.0),
            Symbol::EURUSD | Symbol::GBPUSD => dec!(0.0003),
            Symbol::USDJPY => dec!(0.03),
            Symbol::BTCUSD => dec!(50),
        }
    }

    /// Units of the base instrument per 1.0 lot.
    pub fn contract_value(&self) -> Decimal {
        match self {
            Symbol::XAUUSD => dec!(100),
            Symbol::EURUSD | Symbol::GBPUSD | Symbol::USDJPY => dec!(100000),
            Symbol::BTCUSD => dec!(1),
        }
    }

    pub fn default_max_spread(&self) -> Decimal {
        match self {
            Symbol::XAUUSD => dec!(0.5),
            Symbol::EURUSD | Symbol::GBPUSD => dec!(0.0003),
            Symbol::USDJPY => dec!(0.03),
            Symbol::BTCUSD => dec!(30),
        }
    }

    /// ATR multiple a candle body must exceed to count as displacement.
    pub fn displacement_atr_multiple(&self) -> Decimal {
        match self {
            Symbol::XAUUSD => dec!(2.5),
            _ => dec!(2.0),
        }
    }

    pub fn lot_precision(&self) -> u32 {
        2
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    H1,
    H4,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "M1" | "1M" => Some(Timeframe::M1),
            "M5" | "5M" => Some(Timeframe::M5),
            "M15" | "15M" => Some(Timeframe::M15),
            "H1" | "1H" => Some(Timeframe::H1),
            "H4" | "4H" => Some(Timeframe::H4),
            _ => None,
        }
    }

    pub fn minutes(&self) -> i64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
        }
    }

    /// Timeframes the aggregator builds from the M1 stream, finest first.
    pub fn aggregated() -> [Timeframe; 4] {
        [Timeframe::M5, Timeframe::M15, Timeframe::H1, Timeframe::H4]
    }

    /// Start of the bucket containing `ts`. H4 buckets are anchored at
    /// 00:00/04:00/08:00/12:00/16:00/20:00 UTC, which falls out of the
    /// minutes-since-midnight arithmetic.
    pub fn bucket_start(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let minutes_into_day = (ts.hour() as i64) * 60 + ts.minute() as i64;
        let offset = minutes_into_day % self.minutes();
        ts - chrono::Duration::minutes(offset)
            - chrono::Duration::seconds(ts.second() as i64)
            - chrono::Duration::nanoseconds(ts.nanosecond() as i64)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn sign(&self) -> Decimal {
        match self {
            Side::Buy => Decimal::ONE,
            Side::Sell => Decimal::NEGATIVE_ONE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    Market,
    BuyLimit,
    SellLimit,
    BuyStop,
    SellStop,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Market => "MARKET",
            OrderKind::BuyLimit => "BUY_LIMIT",
            OrderKind::SellLimit => "SELL_LIMIT",
            OrderKind::BuyStop => "BUY_STOP",
            OrderKind::SellStop => "SELL_STOP",
        }
    }

    pub fn is_pending(&self) -> bool {
        !matches!(self, OrderKind::Market)
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradingMode {
    Replay,
    Live,
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradingMode::Replay => write!(f, "Replay"),
            TradingMode::Live => write!(f, "Live"),
        }
    }
}

/// Bid/ask snapshot as reported by a price source.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub bid: Decimal,
    pub ask: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }

    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn h4_buckets_anchor_to_utc_session_boundaries() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, 14, 37, 0).unwrap();
        let bucket = Timeframe::H4.bucket_start(ts);
        assert_eq!(bucket, Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap());

        let exact = Utc.with_ymd_and_hms(2024, 3, 5, 16, 0, 0).unwrap();
        assert_eq!(Timeframe::H4.bucket_start(exact), exact);
    }

    #[test]
    fn m15_bucket_truncates_minutes() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, 9, 44, 0).unwrap();
        assert_eq!(
            Timeframe::M15.bucket_start(ts),
            Utc.with_ymd_and_hms(2024, 3, 5, 9, 30, 0).unwrap()
        );
    }

    #[test]
    fn symbol_round_trips_through_parse() {
        for symbol in Symbol::all() {
            assert_eq!(Symbol::parse(symbol.as_str()), Some(symbol));
        }
        assert_eq!(Symbol::parse("gold"), Some(Symbol::XAUUSD));
        assert_eq!(Symbol::parse("DOGEUSD"), None);
    }

    #[test]
    fn symbol_ordering_is_lexicographic() {
        let mut symbols = Symbol::all();
        symbols.sort();
        let names: Vec<&str> = symbols.iter().map(|s| s.as_str()).collect();
        let mut sorted_names = names.clone();
        sorted_names.sort();
        assert_eq!(names, sorted_names);
    }
}
