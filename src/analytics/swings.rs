#![allow(dead_code)]
use crate::types::{Candle, Swing, SwingKind};

#[derive(Debug, Clone)]
pub struct SwingParams {
    /// Candles required on each side of a pivot extreme.
    pub pivot_width: usize,
    /// Chunk size for the rolling fallback detector.
    pub rolling_lookback: usize,
    /// Below this many pivot swings, rolling swings supplement the set.
    pub min_pivot_swings: usize,
}

impl SwingParams {
    pub fn new(pivot_width: usize) -> Self {
        Self {
            pivot_width,
            rolling_lookback: 10,
            min_pivot_swings: 4,
        }
    }
}

/// Hybrid swing detection (C3): pivot/fractal swings first, supplemented by
/// provisional rolling extremes only while the pivot set is thin. Pivot
/// swings are confirmed `pivot_width` candles after the extreme and never
/// repaint; rolling swings carry `strength == 0` to mark them provisional.
pub fn detect_swings(candles: &[Candle], params: &SwingParams) -> Vec<Swing> {
    let mut swings = pivot_swings(candles, params.pivot_width);

    if swings.len() < params.min_pivot_swings {
        let pivots = swings.clone();
        for rolling in rolling_swings(candles, params.rolling_lookback) {
            // A pivot at the same index always wins the tie.
            let duplicate = pivots
                .iter()
                .any(|p| p.index == rolling.index && p.kind == rolling.kind);
            if !duplicate {
                swings.push(rolling);
            }
        }
    }

    swings.sort_by_key(|s| (s.index, matches!(s.kind, SwingKind::Low)));
    swings
}

fn pivot_swings(candles: &[Candle], width: usize) -> Vec<Swing> {
    let mut swings = Vec::new();
    if width == 0 || candles.len() < 2 * width + 1 {
        return swings;
    }

    for i in width..candles.len() - width {
        let c = &candles[i];

        let is_high = candles[i - width..i]
            .iter()
            .chain(&candles[i + 1..=i + width])
            .all(|n| c.high > n.high);
        if is_high {
            swings.push(Swing {
                index: i,
                timestamp: c.timestamp,
                price: c.high,
                kind: SwingKind::High,
                strength: width,
            });
        }

        let is_low = candles[i - width..i]
            .iter()
            .chain(&candles[i + 1..=i + width])
            .all(|n| c.low < n.low);
        if is_low {
            swings.push(Swing {
                index: i,
                timestamp: c.timestamp,
                price: c.low,
                kind: SwingKind::Low,
                strength: width,
            });
        }
    }

    swings
}

/// Provisional extremes from complete non-overlapping chunks of the window.
fn rolling_swings(candles: &[Candle], lookback: usize) -> Vec<Swing> {
    let mut swings = Vec::new();
    if lookback == 0 {
        return swings;
    }

    let mut start = 0;
    while start + lookback <= candles.len() {
        let chunk = &candles[start..start + lookback];

        // Earliest extreme wins a tie, keeping the output stable.
        if let Some((hi_off, hi)) = chunk
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.high.cmp(&b.1.high).then(b.0.cmp(&a.0)))
        {
            swings.push(Swing {
                index: start + hi_off,
                timestamp: hi.timestamp,
                price: hi.high,
                kind: SwingKind::High,
                strength: 0,
            });
        }

        if let Some((lo_off, lo)) = chunk
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.low.cmp(&b.1.low).then(a.0.cmp(&b.0)))
        {
            swings.push(Swing {
                index: start + lo_off,
                timestamp: lo.timestamp,
                price: lo.low,
                kind: SwingKind::Low,
                strength: 0,
            });
        }

        start += lookback;
    }

    swings
}
