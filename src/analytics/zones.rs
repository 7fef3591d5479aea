#![allow(dead_code)]
use rust_decimal::Decimal;

use super::atr::atr_series;
use crate::types::{
    Candle, Displacement, FairValueGap, LiquiditySweep, OrderBlock, Polarity, StructureEvent,
    Swing, SwingKind,
};

#[derive(Debug, Clone)]
pub struct ZoneParams {
    /// Minimum wick-to-body ratio for an order block origin candle.
    pub ob_wick_ratio: Decimal,
    /// Minimum gap size for a fair value gap.
    pub fvg_min_size: Decimal,
    /// Displacement body must exceed the previous body by this factor.
    pub displacement_body_mult: Decimal,
    /// Displacement body must reach ATR times this factor.
    pub displacement_atr_mult: Decimal,
    pub atr_period: usize,
    /// Wick tolerance when testing a liquidity sweep.
    pub sweep_tolerance: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct ZoneSet {
    pub order_blocks: Vec<OrderBlock>,
    pub fvgs: Vec<FairValueGap>,
    pub displacements: Vec<Displacement>,
    pub sweeps: Vec<LiquiditySweep>,
}

pub fn detect_zones(
    candles: &[Candle],
    swings: &[Swing],
    events: &[StructureEvent],
    params: &ZoneParams,
) -> ZoneSet {
    ZoneSet {
        order_blocks: detect_order_blocks(candles, events, params),
        fvgs: detect_fair_value_gaps(candles, params),
        displacements: detect_displacements(candles, params),
        sweeps: detect_liquidity_sweeps(candles, swings, params),
    }
}

/// Order blocks: the last opposite-polarity candle before each break of
/// structure. The wick gate measures `high − close` on a bearish origin and
/// `open − low` on a bullish one.
pub fn detect_order_blocks(
    candles: &[Candle],
    events: &[StructureEvent],
    params: &ZoneParams,
) -> Vec<OrderBlock> {
    let mut blocks: Vec<OrderBlock> = Vec::new();

    for event in events {
        let direction = event.direction;
        if event.candle_index == 0 || event.candle_index > candles.len() {
            continue;
        }

        // Last opposite-polarity candle strictly before the breaking candle.
        let origin = (0..event.candle_index).rev().find(|&i| match direction {
            Polarity::Bullish => candles[i].is_bearish(),
            Polarity::Bearish => candles[i].is_bullish(),
        });
        let Some(origin_index) = origin else {
            continue;
        };

        if blocks
            .iter()
            .any(|b| b.origin_candle_index == origin_index && b.direction == direction)
        {
            continue;
        }

        let origin = &candles[origin_index];
        let wick = match direction {
            // Bullish OB originates from a bearish candle.
            Polarity::Bullish => origin.high - origin.close,
            // Bearish OB originates from a bullish candle.
            Polarity::Bearish => origin.open - origin.low,
        };
        let body = origin.body();
        if !body.is_zero() && wick / body < params.ob_wick_ratio {
            continue;
        }
        if origin.high <= origin.low {
            continue;
        }

        // Mitigated once price trades through the far side after the break.
        let mitigated = candles[event.candle_index..].iter().any(|c| match direction {
            Polarity::Bullish => c.low < origin.low,
            Polarity::Bearish => c.high > origin.high,
        });

        blocks.push(OrderBlock {
            direction,
            low: origin.low,
            high: origin.high,
            origin_candle_index: origin_index,
            timestamp: origin.timestamp,
            mitigated,
        });
    }

    blocks.sort_by_key(|b| b.origin_candle_index);
    blocks
}

/// Three-candle imbalances. The scan runs the middle index through
/// `1..len-1`, which keeps the final triple (middle at `len − 2`) in play.
pub fn detect_fair_value_gaps(candles: &[Candle], params: &ZoneParams) -> Vec<FairValueGap> {
    let mut gaps = Vec::new();
    if candles.len() < 3 {
        return gaps;
    }

    for i in 1..candles.len() - 1 {
        let prev = &candles[i - 1];
        let next = &candles[i + 1];

        if prev.high < next.low {
            let size = next.low - prev.high;
            if size >= params.fvg_min_size {
                let resolved = candles[i + 2..].iter().any(|c| c.low <= prev.high);
                gaps.push(FairValueGap {
                    direction: Polarity::Bullish,
                    low: prev.high,
                    high: next.low,
                    middle_candle_index: i,
                    timestamp: candles[i].timestamp,
                    resolved,
                });
            }
        } else if prev.low > next.high {
            let size = prev.low - next.high;
            if size >= params.fvg_min_size {
                let resolved = candles[i + 2..].iter().any(|c| c.high >= prev.low);
                gaps.push(FairValueGap {
                    direction: Polarity::Bearish,
                    low: next.high,
                    high: prev.low,
                    middle_candle_index: i,
                    timestamp: candles[i].timestamp,
                    resolved,
                });
            }
        }
    }

    gaps
}

/// Candles whose body exceeds both the previous body times
/// `displacement_body_mult` and ATR times `displacement_atr_mult`. The ATR
/// used at index `i` is computed from candles before `i`.
pub fn detect_displacements(candles: &[Candle], params: &ZoneParams) -> Vec<Displacement> {
    let mut out = Vec::new();
    if candles.len() < 2 {
        return out;
    }
    let atr = atr_series(candles, params.atr_period);

    for i in 1..candles.len() {
        let body = candles[i].body();
        let prev_body = candles[i - 1].body();
        if body <= prev_body * params.displacement_body_mult {
            continue;
        }
        let Some(atr_value) = atr[i - 1] else {
            continue;
        };
        if atr_value.is_zero() || body < atr_value * params.displacement_atr_mult {
            continue;
        }
        let direction = if candles[i].is_bullish() {
            Polarity::Bullish
        } else if candles[i].is_bearish() {
            Polarity::Bearish
        } else {
            continue;
        };
        out.push(Displacement {
            candle_index: i,
            direction,
            timestamp: candles[i].timestamp,
            atr_multiple: body / atr_value,
        });
    }

    out
}

/// Wicks that took out a prior confirmed swing (within tolerance) and closed
/// back inside. Sweeping a high implies a bearish reversal, sweeping a low a
/// bullish one. Each swing is reported swept at most once.
pub fn detect_liquidity_sweeps(
    candles: &[Candle],
    swings: &[Swing],
    params: &ZoneParams,
) -> Vec<LiquiditySweep> {
    let mut sweeps = Vec::new();
    let mut swept = vec![false; swings.len()];

    for ci in 0..candles.len() {
        let candle = &candles[ci];
        for (j, swing) in swings.iter().enumerate() {
            if swept[j] || swing.confirmed_at() > ci || swing.index >= ci {
                continue;
            }

            let (hit, direction) = match swing.kind {
                SwingKind::High => (
                    candle.high >= swing.price - params.sweep_tolerance
                        && candle.close < swing.price,
                    Polarity::Bearish,
                ),
                SwingKind::Low => (
                    candle.low <= swing.price + params.sweep_tolerance
                        && candle.close > swing.price,
                    Polarity::Bullish,
                ),
            };
            if !hit {
                continue;
            }

            let reversal_confirmed = candles[ci + 1..].iter().any(|c| match direction {
                Polarity::Bearish => c.close < candle.close,
                Polarity::Bullish => c.close > candle.close,
            });

            swept[j] = true;
            sweeps.push(LiquiditySweep {
                direction,
                swept_level_price: swing.price,
                candle_index: ci,
                timestamp: candle.timestamp,
                reversal_confirmed,
            });
        }
    }

    sweeps.sort_by_key(|s| s.candle_index);
    sweeps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_util::{candle, minute};
    use crate::types::StructureEventKind;
    use rust_decimal_macros::dec;

    fn params() -> ZoneParams {
        ZoneParams {
            ob_wick_ratio: dec!(0.3),
            fvg_min_size: dec!(0.5),
            displacement_body_mult: dec!(1.5),
            displacement_atr_mult: dec!(2.5),
            atr_period: 3,
            sweep_tolerance: dec!(0.3),
        }
    }

    fn bos(direction: Polarity, candle_index: usize) -> StructureEvent {
        StructureEvent {
            kind: StructureEventKind::Bos,
            direction,
            broken_swing_index: 0,
            broken_price: dec!(2000),
            candle_index,
            timestamp: minute(candle_index as i64),
        }
    }

    #[test]
    fn fvg_detected_in_the_final_triple() {
        // The qualifying triple is the last three candles of the window;
        // an exclusive loop bound would miss it.
        let candles = vec![
            candle(0, dec!(2000), dec!(2001), dec!(1999), dec!(2000.5)),
            candle(1, dec!(2000.5), dec!(2001), dec!(2000), dec!(2000.8)),
            candle(2, dec!(2000.8), dec!(2001.0), dec!(2000.2), dec!(2000.9)),
            candle(3, dec!(2001), dec!(2004), dec!(2000.9), dec!(2003.8)),
            candle(4, dec!(2003.8), dec!(2005), dec!(2002.5), dec!(2004.5)),
        ];
        let gaps = detect_fair_value_gaps(&candles, &params());
        assert_eq!(gaps.len(), 1);
        let gap = &gaps[0];
        assert_eq!(gap.direction, Polarity::Bullish);
        assert_eq!(gap.middle_candle_index, 3);
        assert_eq!(gap.low, dec!(2001.0));
        assert_eq!(gap.high, dec!(2002.5));
        assert!(!gap.resolved);
    }

    #[test]
    fn fvg_below_minimum_size_is_ignored() {
        let candles = vec![
            candle(0, dec!(2000), dec!(2001), dec!(1999), dec!(2000.5)),
            candle(1, dec!(2001), dec!(2001.3), dec!(2000.9), dec!(2001.2)),
            candle(2, dec!(2001.2), dec!(2002), dec!(2001.3), dec!(2001.8)),
        ];
        // Gap is 2001.3 - 2001 = 0.3, under the 0.5 floor.
        assert!(detect_fair_value_gaps(&candles, &params()).is_empty());
    }

    #[test]
    fn bullish_ob_wick_gate_measures_high_minus_close() {
        // Bearish origin candle, body 0.4: high-close is 3.8 (ratio 9.5)
        // while high-open is only 3.4 (ratio 8.5). A 9.0 floor therefore
        // passes only under the high-close measure.
        let origin = candle(0, dec!(2002.6), dec!(2006), dec!(2002), dec!(2002.2));
        let breaker = candle(1, dec!(2002.2), dec!(2008), dec!(2002.1), dec!(2007));
        let candles = vec![origin, breaker];
        let events = vec![bos(Polarity::Bullish, 1)];

        let floor_between_measures = ZoneParams {
            ob_wick_ratio: dec!(9.0),
            ..params()
        };
        let blocks = detect_order_blocks(&candles, &events, &floor_between_measures);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].origin_candle_index, 0);
        assert_eq!(blocks[0].low, dec!(2002));
        assert_eq!(blocks[0].high, dec!(2006));

        let above_both = ZoneParams {
            ob_wick_ratio: dec!(10.0),
            ..params()
        };
        assert!(detect_order_blocks(&candles, &events, &above_both).is_empty());
    }

    #[test]
    fn mitigated_ob_is_flagged() {
        let origin = candle(0, dec!(2003), dec!(2004), dec!(2001), dec!(2001.5));
        let breaker = candle(1, dec!(2001.5), dec!(2008), dec!(2001.4), dec!(2007));
        let trade_through = candle(2, dec!(2007), dec!(2007.5), dec!(2000.5), dec!(2000.9));
        let candles = vec![origin, breaker, trade_through];
        let events = vec![bos(Polarity::Bullish, 1)];

        let relaxed = ZoneParams {
            ob_wick_ratio: dec!(0),
            ..params()
        };
        let blocks = detect_order_blocks(&candles, &events, &relaxed);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].mitigated);
    }

    #[test]
    fn displacement_requires_both_body_and_atr_multiples() {
        let mut candles = vec![
            candle(0, dec!(2000), dec!(2000.5), dec!(1999.5), dec!(2000.2)),
            candle(1, dec!(2000.2), dec!(2000.7), dec!(1999.7), dec!(2000.4)),
            candle(2, dec!(2000.4), dec!(2000.9), dec!(1999.9), dec!(2000.6)),
            candle(3, dec!(2000.6), dec!(2001.1), dec!(2000.1), dec!(2000.8)),
        ];
        // ATR(3) after candle 3 is 1.0; bodies so far are 0.2.
        candles.push(candle(4, dec!(2000.8), dec!(2004), dec!(2000.7), dec!(2003.9)));

        let found = detect_displacements(&candles, &params());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].candle_index, 4);
        assert_eq!(found[0].direction, Polarity::Bullish);
        assert!(found[0].atr_multiple >= dec!(2.5));

        // Same body but an equally large previous body: fails the
        // prev-body multiple.
        candles.push(candle(5, dec!(2003.9), dec!(2007.5), dec!(2003.8), dec!(2007)));
        let found = detect_displacements(&candles, &params());
        assert_eq!(found.len(), 1, "second large candle lacks body expansion");
    }

    #[test]
    fn sweep_needs_wick_beyond_and_close_back_inside() {
        let swings = vec![Swing {
            index: 1,
            timestamp: minute(1),
            price: dec!(2005),
            kind: SwingKind::High,
            strength: 1,
        }];
        let candles = vec![
            candle(0, dec!(2000), dec!(2002), dec!(1999), dec!(2001)),
            candle(1, dec!(2001), dec!(2005), dec!(2000), dec!(2004)),
            candle(2, dec!(2004), dec!(2004.6), dec!(2003), dec!(2003.5)),
            // Wick to 2005.2, close back under the swing.
            candle(3, dec!(2003.5), dec!(2005.2), dec!(2003), dec!(2004.2)),
            candle(4, dec!(2004.2), dec!(2004.4), dec!(2002), dec!(2002.5)),
        ];
        let sweeps = detect_liquidity_sweeps(&candles, &swings, &params());
        assert_eq!(sweeps.len(), 1);
        assert_eq!(sweeps[0].candle_index, 3);
        assert_eq!(sweeps[0].direction, Polarity::Bearish);
        assert_eq!(sweeps[0].swept_level_price, dec!(2005));
        assert!(sweeps[0].reversal_confirmed);
    }
}
