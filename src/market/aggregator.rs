#![allow(dead_code)]
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::types::{Candle, Symbol, Timeframe};

#[derive(Debug, Clone)]
struct PartialCandle {
    bucket_start: DateTime<Utc>,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
}

impl PartialCandle {
    fn start(bucket_start: DateTime<Utc>, m1: &Candle) -> Self {
        Self {
            bucket_start,
            open: m1.open,
            high: m1.high,
            low: m1.low,
            close: m1.close,
            volume: m1.volume,
        }
    }

    fn absorb(&mut self, m1: &Candle) {
        self.high = self.high.max(m1.high);
        self.low = self.low.min(m1.low);
        self.close = m1.close;
        self.volume += m1.volume;
    }

    fn finish(self, symbol: Symbol, timeframe: Timeframe) -> Candle {
        Candle {
            symbol,
            timeframe,
            timestamp: self.bucket_start,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}

/// Deterministic M1 → higher-timeframe rollup (C2). The caller appends the
/// returned boundary-closed candles to the store BEFORE the M1 candle that
/// opened the new bucket, so analytics never observe a half-formed bucket.
#[derive(Debug, Default)]
pub struct CandleAggregator {
    partials: BTreeMap<(Symbol, Timeframe), PartialCandle>,
}

impl CandleAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one M1 candle into every aggregated timeframe. Returns the
    /// higher-timeframe candles whose buckets this M1 candle closed, finest
    /// timeframe first (fixed order, part of the determinism contract).
    pub fn roll(&mut self, m1: &Candle) -> Vec<Candle> {
        debug_assert_eq!(m1.timeframe, Timeframe::M1);
        let mut closed = Vec::new();

        for tf in Timeframe::aggregated() {
            let bucket = tf.bucket_start(m1.timestamp);
            let key = (m1.symbol, tf);

            match self.partials.get_mut(&key) {
                Some(partial) if partial.bucket_start == bucket => {
                    partial.absorb(m1);
                }
                Some(partial) => {
                    // New bucket: close the old partial first.
                    let done = std::mem::replace(partial, PartialCandle::start(bucket, m1));
                    closed.push(done.finish(m1.symbol, tf));
                }
                None => {
                    self.partials.insert(key, PartialCandle::start(bucket, m1));
                }
            }
        }

        closed
    }

    /// Flush all partial buckets as closed candles, finest timeframe first.
    /// Used at end of replay so trailing partial buckets reach the report.
    pub fn flush(&mut self, symbol: Symbol) -> Vec<Candle> {
        let mut out = Vec::new();
        for tf in Timeframe::aggregated() {
            if let Some(partial) = self.partials.remove(&(symbol, tf)) {
                out.push(partial.finish(symbol, tf));
            }
        }
        out
    }

    pub fn reset(&mut self) {
        self.partials.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_util::candle;
    use rust_decimal_macros::dec;

    #[test]
    fn m5_bucket_aggregates_first_last_max_min_sum() {
        let mut agg = CandleAggregator::new();
        let candles = vec![
            candle(0, dec!(2000), dec!(2002), dec!(1999), dec!(2001)),
            candle(1, dec!(2001), dec!(2005), dec!(2000), dec!(2004)),
            candle(2, dec!(2004), dec!(2004.5), dec!(1998), dec!(1999)),
            candle(3, dec!(1999), dec!(2001), dec!(1998.5), dec!(2000.5)),
            candle(4, dec!(2000.5), dec!(2003), dec!(2000), dec!(2002.5)),
        ];
        for c in &candles {
            assert!(agg.roll(c).is_empty());
        }

        // Minute 5 starts the next bucket and closes the first.
        let closed = agg.roll(&candle(5, dec!(2002.5), dec!(2003), dec!(2002), dec!(2002.8)));
        let m5 = closed
            .iter()
            .find(|c| c.timeframe == Timeframe::M5)
            .expect("closed M5 candle");

        assert_eq!(m5.timestamp, candles[0].timestamp);
        assert_eq!(m5.open, dec!(2000));
        assert_eq!(m5.close, dec!(2002.5));
        assert_eq!(m5.high, dec!(2005));
        assert_eq!(m5.low, dec!(1998));
        assert_eq!(m5.volume, dec!(5));
    }

    #[test]
    fn h4_bucket_closes_after_240_minutes() {
        let mut agg = CandleAggregator::new();
        for i in 0..240 {
            let closed = agg.roll(&candle(i, dec!(2000), dec!(2000), dec!(2000), dec!(2000)));
            assert!(closed.iter().all(|c| c.timeframe != Timeframe::H4));
        }
        let closed = agg.roll(&candle(240, dec!(2000), dec!(2000), dec!(2000), dec!(2000)));
        let h4 = closed.iter().find(|c| c.timeframe == Timeframe::H4).unwrap();
        assert_eq!(h4.volume, dec!(240));
        assert_eq!(h4.timestamp, crate::types::test_util::minute(0));
    }

    #[test]
    fn flush_emits_trailing_partials() {
        let mut agg = CandleAggregator::new();
        agg.roll(&candle(0, dec!(2000), dec!(2001), dec!(1999), dec!(2000.5)));
        agg.roll(&candle(1, dec!(2000.5), dec!(2002), dec!(2000), dec!(2001)));

        let flushed = agg.flush(crate::types::Symbol::XAUUSD);
        assert_eq!(flushed.len(), 4);
        for c in &flushed {
            assert_eq!(c.open, dec!(2000));
            assert_eq!(c.close, dec!(2001));
            assert_eq!(c.volume, dec!(2));
        }
    }
}
