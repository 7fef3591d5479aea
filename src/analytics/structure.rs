#![allow(dead_code)]
use crate::types::{
    Bias, Candle, Polarity, StructureEvent, StructureEventKind, Swing, SwingKind,
};

#[derive(Debug, Clone, Copy)]
pub struct StructureParams {
    /// Strict mode: a break requires the close beyond the swing. Relaxed
    /// mode also accepts a wick beyond the swing followed by a confirming
    /// close in the break direction on the next candle.
    pub strict_close: bool,
}

impl Default for StructureParams {
    fn default() -> Self {
        Self { strict_close: true }
    }
}

#[derive(Debug, Clone)]
pub struct StructureAnalysis {
    pub events: Vec<StructureEvent>,
    pub bias: Bias,
    pub anchor: Option<Swing>,
}

/// BOS/CHoCH engine (C4). Walks the window in ascending time order and
/// advances the bias/anchor state machine. Only swings already confirmed at
/// each candle participate, so the output is causal and non-repainting for
/// pivot swings.
pub fn analyze_structure(
    candles: &[Candle],
    swings: &[Swing],
    params: &StructureParams,
) -> StructureAnalysis {
    let mut events = Vec::new();
    let mut bias = Bias::Unknown;
    let mut anchor: Option<Swing> = None;
    let mut broken = vec![false; swings.len()];

    for ci in 0..candles.len() {
        // Late anchor assignment: a bias without an anchor adopts the first
        // appropriate swing that confirms.
        if anchor.is_none() {
            if let Some(p) = bias.polarity() {
                anchor = most_recent_unbroken(swings, &broken, anchor_kind(p), ci);
            }
        }

        let bullish_break = find_break(candles, swings, &broken, ci, Polarity::Bullish, params);
        let bearish_break = find_break(candles, swings, &broken, ci, Polarity::Bearish, params);

        // One event per candle: when a single candle crosses swings on both
        // sides, its own polarity decides the attribution.
        let fired = match (bullish_break, bearish_break) {
            (Some(b), Some(s)) => {
                if candles[ci].close >= candles[ci].open {
                    Some((Polarity::Bullish, b))
                } else {
                    Some((Polarity::Bearish, s))
                }
            }
            (Some(b), None) => Some((Polarity::Bullish, b)),
            (None, Some(s)) => Some((Polarity::Bearish, s)),
            (None, None) => None,
        };

        let Some((direction, swing_pos)) = fired else {
            continue;
        };

        // Deduplicate: every same-kind swing the break level crossed is
        // consumed, the event is attributed to the most recent one.
        let level = break_level(candles, ci, direction, params);
        for (j, s) in swings.iter().enumerate() {
            if s.kind == broken_kind(direction)
                && s.confirmed_at() <= ci
                && s.index < ci
                && crossed(direction, level, s.price)
            {
                broken[j] = true;
            }
        }

        let broken_swing = swings[swing_pos];
        let candle = &candles[ci];

        match bias.polarity() {
            None => {
                bias = Bias::from_polarity(direction);
                anchor = most_recent_unbroken(swings, &broken, anchor_kind(direction), ci);
                events.push(StructureEvent {
                    kind: StructureEventKind::Bos,
                    direction,
                    broken_swing_index: broken_swing.index,
                    broken_price: broken_swing.price,
                    candle_index: ci,
                    timestamp: candle.timestamp,
                });
            }
            Some(current) if current == direction => {
                if let Some(a) = most_recent_unbroken(swings, &broken, anchor_kind(direction), ci) {
                    anchor = Some(a);
                }
                events.push(StructureEvent {
                    kind: StructureEventKind::Bos,
                    direction,
                    broken_swing_index: broken_swing.index,
                    broken_price: broken_swing.price,
                    candle_index: ci,
                    timestamp: candle.timestamp,
                });
            }
            Some(_) => match anchor {
                Some(flipped_from) if crossed(direction, level, flipped_from.price) => {
                    bias = Bias::from_polarity(direction);
                    anchor = most_recent_unbroken(swings, &broken, anchor_kind(direction), ci);
                    events.push(StructureEvent {
                        kind: StructureEventKind::Choch,
                        direction,
                        broken_swing_index: flipped_from.index,
                        broken_price: flipped_from.price,
                        candle_index: ci,
                        timestamp: candle.timestamp,
                    });
                }
                _ => {
                    // Counter-bias break that did not reach the anchor:
                    // recorded, but the bias holds.
                    events.push(StructureEvent {
                        kind: StructureEventKind::Bos,
                        direction,
                        broken_swing_index: broken_swing.index,
                        broken_price: broken_swing.price,
                        candle_index: ci,
                        timestamp: candle.timestamp,
                    });
                }
            },
        }
    }

    StructureAnalysis {
        events,
        bias,
        anchor,
    }
}

/// Kind of swing that anchors a bias: the higher-low under a bullish bias,
/// the lower-high under a bearish one.
fn anchor_kind(bias_direction: Polarity) -> SwingKind {
    match bias_direction {
        Polarity::Bullish => SwingKind::Low,
        Polarity::Bearish => SwingKind::High,
    }
}

/// Kind of swing a break in `direction` consumes.
fn broken_kind(direction: Polarity) -> SwingKind {
    match direction {
        Polarity::Bullish => SwingKind::High,
        Polarity::Bearish => SwingKind::Low,
    }
}

fn crossed(direction: Polarity, level: rust_decimal::Decimal, price: rust_decimal::Decimal) -> bool {
    match direction {
        Polarity::Bullish => level > price,
        Polarity::Bearish => level < price,
    }
}

/// The price level the candle established for break tests. In relaxed mode
/// a confirmed previous-candle wick extends the level beyond the close.
fn break_level(
    candles: &[Candle],
    ci: usize,
    direction: Polarity,
    params: &StructureParams,
) -> rust_decimal::Decimal {
    let close = candles[ci].close;
    if params.strict_close || ci == 0 {
        return close;
    }
    let prev = &candles[ci - 1];
    match direction {
        Polarity::Bullish if candles[ci].close > prev.close => close.max(prev.high),
        Polarity::Bearish if candles[ci].close < prev.close => close.min(prev.low),
        _ => close,
    }
}

/// Position (into `swings`) of the most recent unbroken swing that candle
/// `ci` breaks in `direction`, if any.
fn find_break(
    candles: &[Candle],
    swings: &[Swing],
    broken: &[bool],
    ci: usize,
    direction: Polarity,
    params: &StructureParams,
) -> Option<usize> {
    let level = break_level(candles, ci, direction, params);
    swings
        .iter()
        .enumerate()
        .filter(|(j, s)| {
            !broken[*j]
                && s.kind == broken_kind(direction)
                && s.confirmed_at() <= ci
                && s.index < ci
                && crossed(direction, level, s.price)
        })
        .max_by_key(|(_, s)| s.index)
        .map(|(j, _)| j)
}

fn most_recent_unbroken(
    swings: &[Swing],
    broken: &[bool],
    kind: SwingKind,
    ci: usize,
) -> Option<Swing> {
    swings
        .iter()
        .enumerate()
        .filter(|(j, s)| !broken[*j] && s.kind == kind && s.confirmed_at() <= ci && s.index < ci)
        .max_by_key(|(_, s)| s.index)
        .map(|(_, s)| *s)
}
