use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Symbol, Timeframe};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    /// Bucket start, minute-aligned to the timeframe boundary, UTC.
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    pub fn body(&self) -> Decimal {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> Decimal {
        self.high - self.low
    }

    pub fn upper_wick(&self) -> Decimal {
        self.high - self.close.max(self.open)
    }

    pub fn lower_wick(&self) -> Decimal {
        self.close.min(self.open) - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// OHLC sanity: low ≤ min(open, close) ≤ max(open, close) ≤ high, volume ≥ 0.
    pub fn is_well_formed(&self) -> bool {
        self.low <= self.open.min(self.close)
            && self.open.max(self.close) <= self.high
            && self.volume >= Decimal::ZERO
    }

    /// True if the candle's [low, high] range contains `price`.
    pub fn contains(&self, price: Decimal) -> bool {
        self.low <= price && price <= self.high
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_util::candle;
    use rust_decimal_macros::dec;

    #[test]
    fn wick_helpers_follow_body_orientation() {
        let bullish = candle(0, dec!(10), dec!(15), dec!(9), dec!(14));
        assert_eq!(bullish.upper_wick(), dec!(1));
        assert_eq!(bullish.lower_wick(), dec!(1));
        assert!(bullish.is_bullish());

        let bearish = candle(1, dec!(14), dec!(15), dec!(9), dec!(10));
        assert_eq!(bearish.upper_wick(), dec!(1));
        assert_eq!(bearish.lower_wick(), dec!(1));
        assert!(bearish.is_bearish());
    }

    #[test]
    fn well_formed_rejects_inverted_range() {
        let mut c = candle(0, dec!(10), dec!(15), dec!(9), dec!(14));
        assert!(c.is_well_formed());
        c.low = dec!(12);
        assert!(!c.is_well_formed());
        c.low = dec!(9);
        c.volume = dec!(-1);
        assert!(!c.is_well_formed());
    }
}
