#![allow(dead_code)]
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bullish/bearish polarity of structural artifacts (swings, breaks, zones).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarity {
    Bullish,
    Bearish,
}

impl Polarity {
    pub fn opposite(&self) -> Self {
        match self {
            Polarity::Bullish => Polarity::Bearish,
            Polarity::Bearish => Polarity::Bullish,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Polarity::Bullish => "bullish",
            Polarity::Bearish => "bearish",
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwingKind {
    High,
    Low,
}

/// A confirmed structural extreme. `index` addresses the candle window the
/// swing was detected in; windows are bounded, so indices are only valid
/// relative to that window, never across ticks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Swing {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    pub kind: SwingKind,
    /// Pivot width that confirmed it; 0 marks a provisional rolling swing.
    pub strength: usize,
}

impl Swing {
    /// Window index at which this swing became known. Pivot swings confirm
    /// `strength` candles after the extreme; rolling swings are provisional
    /// and usable immediately.
    pub fn confirmed_at(&self) -> usize {
        self.index + self.strength
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructureEventKind {
    Bos,
    Choch,
}

/// Break of structure or change of character, attributed to the candle whose
/// close (or confirmed wick, in relaxed mode) crossed the broken swing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructureEvent {
    pub kind: StructureEventKind,
    pub direction: Polarity,
    pub broken_swing_index: usize,
    pub broken_price: Decimal,
    pub candle_index: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bias {
    Unknown,
    Bullish,
    Bearish,
}

impl Bias {
    pub fn polarity(&self) -> Option<Polarity> {
        match self {
            Bias::Unknown => None,
            Bias::Bullish => Some(Polarity::Bullish),
            Bias::Bearish => Some(Polarity::Bearish),
        }
    }

    pub fn from_polarity(p: Polarity) -> Self {
        match p {
            Polarity::Bullish => Bias::Bullish,
            Polarity::Bearish => Bias::Bearish,
        }
    }
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bias::Unknown => write!(f, "unknown"),
            Bias::Bullish => write!(f, "bullish"),
            Bias::Bearish => write!(f, "bearish"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Bullish,
    Bearish,
    Sideways,
}

impl Trend {
    pub fn polarity(&self) -> Option<Polarity> {
        match self {
            Trend::Bullish => Some(Polarity::Bullish),
            Trend::Bearish => Some(Polarity::Bearish),
            Trend::Sideways => None,
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Bullish => write!(f, "bullish"),
            Trend::Bearish => write!(f, "bearish"),
            Trend::Sideways => write!(f, "sideways"),
        }
    }
}

/// Where price sits inside the current swing range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PdZone {
    Discount,
    Neutral,
    Premium,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdPosition {
    /// (price − swingLow) / (swingHigh − swingLow), clamped to [0, 1].
    pub position: Decimal,
    pub zone: PdZone,
    pub range_low: Decimal,
    pub range_high: Decimal,
}
