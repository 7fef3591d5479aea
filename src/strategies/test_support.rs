//! Hand-built snapshots for strategy and filter tests.
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::analytics::{MarketSnapshot, TimeframeContext, ZoneSet};
use crate::config::RunConfig;
use crate::types::{
    Bias, Displacement, FairValueGap, OrderBlock, PdPosition, PdZone, Polarity, StructureEvent,
    StructureEventKind, Swing, SwingKind, Symbol, Timeframe, Trend,
};

pub fn test_time() -> chrono::DateTime<Utc> {
    // Inside the London session.
    Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap()
}

pub fn test_config() -> RunConfig {
    let mut config = RunConfig::default();
    config.general.symbols = vec![Symbol::XAUUSD];
    config.strategy.min_htf_candles = 10;
    config.strategy.min_itf_candles = 10;
    config.strategy.min_ltf_candles = 10;
    config
}

fn base_context(timeframe: Timeframe, candle_count: usize) -> TimeframeContext {
    TimeframeContext {
        timeframe,
        candle_count,
        last_close: Some(dec!(2002.4)),
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

pub fn htf_context(bias: Bias, trend: Trend) -> TimeframeContext {
    let mut ctx = base_context(Timeframe::H4, 50);
    ctx.bias = bias;
    ctx.trend = trend;
    ctx.bias_trend = trend;
    ctx
}

fn swing(index: usize, price: Decimal, kind: SwingKind) -> Swing {
    Swing {
        index,
        timestamp: test_time(),
        price,
        kind,
        strength: 3,
    }
}

fn bos(direction: Polarity, candle_index: usize, broken_price: Decimal) -> StructureEvent {
    StructureEvent {
        kind: StructureEventKind::Bos,
        direction,
        broken_swing_index: 0,
        broken_price,
        candle_index,
        timestamp: test_time(),
    }
}

/// M15 context carrying a complete bullish setup: BOS at index 95,
/// displacement at 96, an unresolved FVG [2001, 2003], an unmitigated order
/// block [2000.8, 2003.2] (intersection zone [2001, 2003]) and a protective
/// swing low at 2000.5 below the zone.
pub fn bullish_itf_setup() -> TimeframeContext {
    let mut ctx = base_context(Timeframe::M15, 100);
    ctx.bias = Bias::Bullish;
    ctx.trend = Trend::Bullish;
    ctx.bias_trend = Trend::Bullish;
    ctx.swings = vec![
        swing(60, dec!(2000.5), SwingKind::Low),
        swing(70, dec!(2010), SwingKind::High),
    ];
    ctx.events = vec![bos(Polarity::Bullish, 95, dec!(2005))];
    ctx.pd = Some(PdPosition {
        position: dec!(0.2),
        zone: PdZone::Discount,
        range_low: dec!(2000.5),
        range_high: dec!(2010),
    });
    ctx.zones = ZoneSet {
        order_blocks: vec![OrderBlock {
            direction: Polarity::Bullish,
            low: dec!(2000.8),
            high: dec!(2003.2),
            origin_candle_index: 94,
            timestamp: test_time(),
            mitigated: false,
        }],
        fvgs: vec![FairValueGap {
            direction: Polarity::Bullish,
            low: dec!(2001),
            high: dec!(2003),
            middle_candle_index: 96,
            timestamp: test_time(),
            resolved: false,
        }],
        displacements: vec![Displacement {
            candle_index: 96,
            direction: Polarity::Bullish,
            timestamp: test_time(),
            atr_multiple: dec!(3.0),
        }],
        sweeps: Vec::new(),
    };
    ctx
}

pub fn empty_itf() -> TimeframeContext {
    let mut ctx = base_context(Timeframe::M15, 100);
    ctx.bias = Bias::Bullish;
    ctx.trend = Trend::Bullish;
    ctx
}

/// M1 context with a recent bullish BOS and no refined order block.
pub fn bullish_ltf_bos_only() -> TimeframeContext {
    let mut ctx = base_context(Timeframe::M1, 60);
    ctx.bias = Bias::Bullish;
    ctx.trend = Trend::Bullish;
    ctx.bias_trend = Trend::Bullish;
    ctx.events = vec![bos(Polarity::Bullish, 58, dec!(2002.2))];
    ctx
}

/// M1 context with a recent bullish BOS plus a refined order block
/// [2002.0, 2002.6] inside the M15 zone.
pub fn bullish_ltf_refined() -> TimeframeContext {
    let mut ctx = bullish_ltf_bos_only();
    ctx.zones.order_blocks = vec![OrderBlock {
        direction: Polarity::Bullish,
        low: dec!(2002.0),
        high: dec!(2002.6),
        origin_candle_index: 55,
        timestamp: test_time(),
        mitigated: false,
    }];
    ctx
}

pub fn empty_ltf_at(price: Decimal) -> TimeframeContext {
    let mut ctx = base_context(Timeframe::M1, 60);
    ctx.last_close = Some(price);
    ctx
}

/// Assemble a snapshot; `price` becomes the LTF close and the bid, with a
/// 0.3 spread.
pub fn snapshot_with(
    htf: TimeframeContext,
    itf: TimeframeContext,
    mut ltf: TimeframeContext,
    price: Decimal,
) -> MarketSnapshot {
    ltf.last_close = Some(price);
    MarketSnapshot {
        symbol: Symbol::XAUUSD,
        time: test_time(),
        bid: price,
        ask: price + dec!(0.3),
        htf,
        itf,
        ltf,
    }
}
