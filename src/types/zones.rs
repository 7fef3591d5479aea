#![allow(dead_code)]
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Polarity;

/// The last opposite-polarity candle before a break of structure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderBlock {
    pub direction: Polarity,
    pub low: Decimal,
    pub high: Decimal,
    pub origin_candle_index: usize,
    pub timestamp: DateTime<Utc>,
    /// Set once price trades through the far side; mitigated blocks are
    /// excluded from setup formation.
    pub mitigated: bool,
}

impl OrderBlock {
    pub fn midpoint(&self) -> Decimal {
        (self.low + self.high) / Decimal::TWO
    }

    pub fn contains(&self, price: Decimal) -> bool {
        self.low <= price && price <= self.high
    }
}

/// Three-candle imbalance around `middle_candle_index`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FairValueGap {
    pub direction: Polarity,
    pub low: Decimal,
    pub high: Decimal,
    pub middle_candle_index: usize,
    pub timestamp: DateTime<Utc>,
    pub resolved: bool,
}

impl FairValueGap {
    pub fn size(&self) -> Decimal {
        self.high - self.low
    }

    pub fn midpoint(&self) -> Decimal {
        (self.low + self.high) / Decimal::TWO
    }
}

/// Candle whose body dwarfs both the previous body and recent ATR.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Displacement {
    pub candle_index: usize,
    pub direction: Polarity,
    pub timestamp: DateTime<Utc>,
    pub atr_multiple: Decimal,
}

/// A wick that took out a prior swing and closed back inside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiquiditySweep {
    /// Polarity of the implied reversal: sweeping a swing high is bearish,
    /// sweeping a swing low is bullish.
    pub direction: Polarity,
    pub swept_level_price: Decimal,
    pub candle_index: usize,
    pub timestamp: DateTime<Utc>,
    pub reversal_confirmed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneSource {
    Fvg,
    OrderBlock,
    FvgObOverlap,
}

impl ZoneSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneSource::Fvg => "FVG",
            ZoneSource::OrderBlock => "OB",
            ZoneSource::FvgObOverlap => "FVG+OB",
        }
    }
}

/// Price interval a setup waits on; armed while price is outside, triggered
/// when price returns into it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetupZone {
    pub direction: Polarity,
    pub zone_low: Decimal,
    pub zone_high: Decimal,
    pub source: ZoneSource,
    pub created_at: DateTime<Utc>,
}

impl SetupZone {
    pub fn size(&self) -> Decimal {
        self.zone_high - self.zone_low
    }

    pub fn midpoint(&self) -> Decimal {
        (self.zone_low + self.zone_high) / Decimal::TWO
    }

    /// Containment test with the zone expanded by `buffer_fraction` of its
    /// size on each side.
    pub fn contains_with_buffer(&self, price: Decimal, buffer_fraction: Decimal) -> bool {
        let pad = self.size() * buffer_fraction;
        price >= self.zone_low - pad && price <= self.zone_high + pad
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn setup_zone_buffer_expands_both_sides() {
        let zone = SetupZone {
            direction: Polarity::Bullish,
            zone_low: dec!(2002),
            zone_high: dec!(2003),
            source: ZoneSource::FvgObOverlap,
            created_at: chrono::Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap(),
        };
        // ±10% of a 1.0-wide zone reaches 0.1 beyond each edge.
        assert!(zone.contains_with_buffer(dec!(2001.95), dec!(0.10)));
        assert!(zone.contains_with_buffer(dec!(2003.05), dec!(0.10)));
        assert!(!zone.contains_with_buffer(dec!(2001.80), dec!(0.10)));
        assert!(!zone.contains_with_buffer(dec!(2003.20), dec!(0.10)));
    }
}
