#![allow(dead_code)]
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::{
    PdPosition, PdZone, Polarity, StructureEvent, StructureEventKind, Swing, SwingKind, Trend,
};

#[derive(Debug, Clone, Copy)]
pub struct TrendParams {
    /// Swing pairs that must be strictly monotonic for a formal trend.
    pub swing_pairs: usize,
    /// Structure events inspected for the BOS-majority fallback.
    pub majority_window: usize,
    /// Majority margin required to adopt a direction.
    pub majority_margin: usize,
}

impl Default for TrendParams {
    fn default() -> Self {
        Self {
            swing_pairs: 2,
            majority_window: 6,
            majority_margin: 2,
        }
    }
}

/// Formal trend (C5): strictly ascending highs AND lows over the last
/// `swing_pairs` of each kind is bullish, the mirror is bearish. A sideways
/// verdict falls back to the most recent CHoCH direction, then to a clear
/// BOS majority, before standing.
pub fn classify_trend(swings: &[Swing], events: &[StructureEvent], params: &TrendParams) -> Trend {
    let highs: Vec<Decimal> = swings
        .iter()
        .filter(|s| s.kind == SwingKind::High)
        .map(|s| s.price)
        .collect();
    let lows: Vec<Decimal> = swings
        .iter()
        .filter(|s| s.kind == SwingKind::Low)
        .map(|s| s.price)
        .collect();

    let k = params.swing_pairs;
    if ascending(&highs, k) && ascending(&lows, k) {
        return Trend::Bullish;
    }
    if descending(&highs, k) && descending(&lows, k) {
        return Trend::Bearish;
    }

    // Fallback 1: adopt a recent change of character.
    if let Some(choch) = events
        .iter()
        .rev()
        .find(|e| e.kind == StructureEventKind::Choch)
    {
        return match choch.direction {
            Polarity::Bullish => Trend::Bullish,
            Polarity::Bearish => Trend::Bearish,
        };
    }

    // Fallback 2: clear BOS majority over the recent window.
    let recent = events.iter().rev().take(params.majority_window);
    let mut bullish = 0usize;
    let mut bearish = 0usize;
    for e in recent {
        match e.direction {
            Polarity::Bullish => bullish += 1,
            Polarity::Bearish => bearish += 1,
        }
    }
    if bullish >= bearish + params.majority_margin {
        return Trend::Bullish;
    }
    if bearish >= bullish + params.majority_margin {
        return Trend::Bearish;
    }

    Trend::Sideways
}

fn ascending(values: &[Decimal], k: usize) -> bool {
    if k < 2 || values.len() < k {
        return false;
    }
    values[values.len() - k..].windows(2).all(|w| w[0] < w[1])
}

fn descending(values: &[Decimal], k: usize) -> bool {
    if k < 2 || values.len() < k {
        return false;
    }
    values[values.len() - k..].windows(2).all(|w| w[0] > w[1])
}

/// Premium/discount position of `price` inside the current swing range
/// (most recent confirmed swing high/low). `None` when the range is absent
/// or degenerate.
pub fn pd_position(price: Decimal, swings: &[Swing]) -> Option<PdPosition> {
    let high = swings
        .iter()
        .filter(|s| s.kind == SwingKind::High)
        .max_by_key(|s| s.index)?
        .price;
    let low = swings
        .iter()
        .filter(|s| s.kind == SwingKind::Low)
        .max_by_key(|s| s.index)?
        .price;

    if high <= low {
        return None;
    }

    let raw = (price - low) / (high - low);
    let position = raw.clamp(Decimal::ZERO, Decimal::ONE);

    // Neutral only within tolerance of the exact midpoint; neutral blocks
    // both sides.
    let tolerance = dec!(0.001);
    let half = dec!(0.5);
    let zone = if (position - half).abs() <= tolerance {
        PdZone::Neutral
    } else if position < half {
        PdZone::Discount
    } else {
        PdZone::Premium
    };

    Some(PdPosition {
        position,
        zone,
        range_low: low,
        range_high: high,
    })
}
