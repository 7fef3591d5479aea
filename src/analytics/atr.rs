#![allow(dead_code)]
use rust_decimal::Decimal;

use crate::types::Candle;

/// Average true range with Wilder smoothing. Updates strictly in candle
/// order; the smoothed value never depends on container iteration.
#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    prev_close: Option<Decimal>,
    seeded: usize,
    seed_sum: Decimal,
    value: Option<Decimal>,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev_close: None,
            seeded: 0,
            seed_sum: Decimal::ZERO,
            value: None,
        }
    }

    pub fn update(&mut self, candle: &Candle) -> Option<Decimal> {
        let tr = self.true_range(candle);
        self.prev_close = Some(candle.close);

        match self.value {
            Some(prev) => {
                let period = Decimal::from(self.period as u32);
                self.value = Some((prev * (period - Decimal::ONE) + tr) / period);
            }
            None => {
                self.seed_sum += tr;
                self.seeded += 1;
                if self.seeded == self.period {
                    self.value = Some(self.seed_sum / Decimal::from(self.period as u32));
                }
            }
        }

        self.value
    }

    fn true_range(&self, candle: &Candle) -> Decimal {
        let hl = candle.high - candle.low;
        match self.prev_close {
            Some(prev) => {
                let hc = (candle.high - prev).abs();
                let lc = (candle.low - prev).abs();
                hl.max(hc).max(lc)
            }
            None => hl,
        }
    }

    pub fn value(&self) -> Option<Decimal> {
        self.value
    }

    pub fn is_ready(&self) -> bool {
        self.value.is_some()
    }

    pub fn reset(&mut self) {
        self.prev_close = None;
        self.seeded = 0;
        self.seed_sum = Decimal::ZERO;
        self.value = None;
    }
}

/// ATR value per candle index, where `out[i]` is the ATR computed from
/// candles `0..=i`. `None` until `period` candles are seen.
pub fn atr_series(candles: &[Candle], period: usize) -> Vec<Option<Decimal>> {
    let mut atr = Atr::new(period);
    candles.iter().map(|c| atr.update(c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_util::candle;
    use rust_decimal_macros::dec;

    #[test]
    fn seeds_with_simple_average_then_wilder_smooths() {
        let mut atr = Atr::new(3);
        // Ranges 2, 2, 2 -> seeded ATR 2.
        assert!(atr.update(&candle(0, dec!(10), dec!(12), dec!(10), dec!(11))).is_none());
        assert!(atr.update(&candle(1, dec!(11), dec!(12), dec!(10), dec!(11))).is_none());
        let seeded = atr.update(&candle(2, dec!(11), dec!(12), dec!(10), dec!(11))).unwrap();
        assert_eq!(seeded, dec!(2));

        // TR 5 -> (2*2 + 5) / 3 = 3.
        let next = atr.update(&candle(3, dec!(11), dec!(15), dec!(10), dec!(14))).unwrap();
        assert_eq!(next, dec!(3));
    }

    #[test]
    fn true_range_accounts_for_gaps() {
        let mut atr = Atr::new(1);
        atr.update(&candle(0, dec!(10), dec!(11), dec!(9), dec!(10)));
        // Gap up: high-low is 1 but low-prev_close is 4.
        let v = atr.update(&candle(1, dec!(14), dec!(15), dec!(14), dec!(15))).unwrap();
        assert_eq!(v, dec!(5));
    }
}
