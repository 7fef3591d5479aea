#![allow(dead_code)]
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::structure::{analyze_structure, StructureParams};
use super::swings::{detect_swings, SwingParams};
use super::trend::{classify_trend, pd_position, TrendParams};
use super::zones::{detect_zones, ZoneParams, ZoneSet};
use crate::market::CandleStore;
use crate::types::{Bias, PdPosition, StructureEvent, Swing, Symbol, Timeframe, Trend};

/// Analytic knobs for one timeframe.
#[derive(Debug, Clone)]
pub struct TimeframeParams {
    pub window: usize,
    pub swings: SwingParams,
    pub structure: StructureParams,
    pub trend: TrendParams,
    pub zones: ZoneParams,
}

/// Everything the strategies read about one (symbol, timeframe) at one
/// instant. Assembled fresh per tick from the candle store; registries are
/// linear vectors, snapshots never hold references into each other.
#[derive(Debug, Clone)]
pub struct TimeframeContext {
    pub timeframe: Timeframe,
    pub candle_count: usize,
    pub last_close: Option<Decimal>,
    pub swings: Vec<Swing>,
    pub events: Vec<StructureEvent>,
    pub bias: Bias,
    pub anchor: Option<Swing>,
    /// Formal trend: HH/HL vs LL/LH with CHoCH/BOS-majority fallback.
    pub trend: Trend,
    /// Bias-derived trend, exposed for diagnostics next to the formal one.
    pub bias_trend: Trend,
    pub pd: Option<PdPosition>,
    pub zones: ZoneSet,
    /// Volume traded on bullish vs bearish candles over the recent window,
    /// for the volume-imbalance confluence flag.
    pub recent_bull_volume: Decimal,
    pub recent_bear_volume: Decimal,
}

impl TimeframeContext {
    fn empty(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            candle_count: 0,
            last_close: None,
            swings: Vec::new(),
            events: Vec::new(),
            bias: Bias::Unknown,
            anchor: None,
            trend: Trend::Sideways,
            bias_trend: Trend::Sideways,
            pd: None,
            zones: ZoneSet::default(),
            recent_bull_volume: Decimal::ZERO,
            recent_bear_volume: Decimal::ZERO,
        }
    }
}

/// Multi-timeframe view (C7). The store only ever contains boundary-closed
/// candles, so the LTF snapshot cannot observe a half-formed HTF bucket.
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub symbol: Symbol,
    pub time: DateTime<Utc>,
    pub bid: Decimal,
    pub ask: Decimal,
    pub htf: TimeframeContext,
    pub itf: TimeframeContext,
    pub ltf: TimeframeContext,
}

impl MarketSnapshot {
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }

    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }
}

#[derive(Debug, Clone)]
pub struct ContextBuilder {
    pub htf: TimeframeParams,
    pub itf: TimeframeParams,
    pub ltf: TimeframeParams,
}

impl ContextBuilder {
    pub const HTF: Timeframe = Timeframe::H4;
    pub const ITF: Timeframe = Timeframe::M15;
    pub const LTF: Timeframe = Timeframe::M1;

    pub fn build(
        &self,
        store: &CandleStore,
        symbol: Symbol,
        time: DateTime<Utc>,
        bid: Decimal,
        ask: Decimal,
    ) -> MarketSnapshot {
        MarketSnapshot {
            symbol,
            time,
            bid,
            ask,
            htf: build_timeframe(store, symbol, Self::HTF, &self.htf),
            itf: build_timeframe(store, symbol, Self::ITF, &self.itf),
            ltf: build_timeframe(store, symbol, Self::LTF, &self.ltf),
        }
    }
}

fn build_timeframe(
    store: &CandleStore,
    symbol: Symbol,
    timeframe: Timeframe,
    params: &TimeframeParams,
) -> TimeframeContext {
    let candles = store.latest(symbol, timeframe, params.window);
    if candles.is_empty() {
        return TimeframeContext::empty(timeframe);
    }

    let swings = detect_swings(candles, &params.swings);
    let analysis = analyze_structure(candles, &swings, &params.structure);
    let trend = classify_trend(&swings, &analysis.events, &params.trend);
    let bias_trend = match analysis.bias {
        Bias::Bullish => Trend::Bullish,
        Bias::Bearish => Trend::Bearish,
        Bias::Unknown => Trend::Sideways,
    };
    let last_close = candles.last().map(|c| c.close);
    let pd = last_close.and_then(|price| pd_position(price, &swings));
    let zones = detect_zones(candles, &swings, &analysis.events, &params.zones);

    let recent = &candles[candles.len().saturating_sub(20)..];
    let mut recent_bull_volume = Decimal::ZERO;
    let mut recent_bear_volume = Decimal::ZERO;
    for c in recent {
        if c.is_bullish() {
            recent_bull_volume += c.volume;
        } else if c.is_bearish() {
            recent_bear_volume += c.volume;
        }
    }

    TimeframeContext {
        timeframe,
        candle_count: candles.len(),
        last_close,
        swings,
        events: analysis.events,
        bias: analysis.bias,
        anchor: analysis.anchor,
        trend,
        bias_trend,
        pd,
        zones,
        recent_bull_volume,
        recent_bear_volume,
    }
}
