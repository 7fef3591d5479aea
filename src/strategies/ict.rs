#![allow(dead_code)]
use rust_decimal::Decimal;

use crate::analytics::{MarketSnapshot, TimeframeContext};
use crate::config::{RunConfig, SymbolRule};
use crate::execution::session::in_any_session;
use crate::types::{
    Decision, FairValueGap, OrderBlock, OrderKind, PdZone, Polarity, ReasonCode, SetupZone, Side,
    SwingKind, TradeProposal, Trend, ZoneSource,
};

/// The H4 bias -> M15 setup zone -> M1 refinement pipeline (C8). Stateless:
/// every evaluation reads only the snapshot and the immutable config.
#[derive(Debug, Clone, Copy, Default)]
pub struct IctStrategy;

/// Intermediate product of the M15 stage.
#[derive(Debug, Clone)]
struct SetupContext {
    zone: SetupZone,
    fvg: Option<FairValueGap>,
    order_block: Option<OrderBlock>,
    displacement_present: bool,
}

impl IctStrategy {
    pub fn evaluate(&self, snapshot: &MarketSnapshot, config: &RunConfig) -> Decision {
        let s = &config.strategy;
        let rule = config.rule(snapshot.symbol);

        if let Some(no) = check_minimum(&snapshot.htf, s.min_htf_candles) {
            return no;
        }
        if let Some(no) = check_minimum(&snapshot.itf, s.min_itf_candles) {
            return no;
        }
        if let Some(no) = check_minimum(&snapshot.ltf, s.min_ltf_candles) {
            return no;
        }

        // Step 1: H4 bias.
        let Some(direction) = snapshot.htf.bias.polarity() else {
            return Decision::no_signal(ReasonCode::HtfSideways);
        };
        if s.avoid_htf_sideways && snapshot.htf.trend == Trend::Sideways {
            return Decision::no_signal(ReasonCode::HtfSideways);
        }

        // Step 2: M15 setup zone aligned with the bias.
        let Some(setup) = find_setup(&snapshot.itf, direction, s.setup_window_itf, snapshot) else {
            return Decision::no_signal(ReasonCode::NoM15Setup);
        };

        // Step 3: return-to-zone gate.
        let Some(price) = snapshot.ltf.last_close else {
            return Decision::no_signal(ReasonCode::BufferEmpty);
        };
        if !setup
            .zone
            .contains_with_buffer(price, s.zone_buffer_fraction)
        {
            return Decision::no_signal(ReasonCode::PriceNotInZone);
        }

        // Step 4: M1 confirmation. A BOS is sufficient; CHoCH also counts.
        let confirmed = snapshot.ltf.events.iter().any(|e| {
            e.direction == direction
                && e.candle_index + s.refinement_window_ltf >= snapshot.ltf.candle_count
        });
        if !confirmed {
            return Decision::no_signal(ReasonCode::NoM1Confirmation);
        }

        let refined = find_refined_ob(&snapshot.ltf, direction, &setup.zone);

        let side = match direction {
            Polarity::Bullish => Side::Buy,
            Polarity::Bearish => Side::Sell,
        };
        let entry = entry_price(side, &setup, refined.as_ref());

        // Step 5: stop loss, with the structural fallback ladder.
        let stop_loss = stop_loss(side, entry, &setup, refined.as_ref(), &snapshot.itf, &rule);
        let risk = (entry - stop_loss).abs();
        let sided_ok = match side {
            Side::Buy => stop_loss < entry,
            Side::Sell => stop_loss > entry,
        };
        if !sided_ok {
            return Decision::no_signal(ReasonCode::InvalidSl);
        }
        if risk < rule.min_risk_distance {
            return Decision::no_signal(ReasonCode::RiskTooSmall {
                distance: risk,
                min: rule.min_risk_distance,
            });
        }
        if risk > entry * s.max_risk_fraction {
            return Decision::no_signal(ReasonCode::RiskTooLarge {
                distance: risk,
                cap: entry * s.max_risk_fraction,
            });
        }

        // Step 6: take profit at the configured reward multiple.
        let take_profit = match side {
            Side::Buy => entry + s.reward_multiple * risk,
            Side::Sell => entry - s.reward_multiple * risk,
        };

        // Step 7: order kind from entry vs current market.
        let order_kind = select_order_kind(side, entry, snapshot, s.order_kind_epsilon_fraction);

        // Step 8: confluence score.
        let (confluence_score, reason_codes) = score_confluence(
            snapshot,
            direction,
            &setup,
            refined.is_some(),
            &rule,
            config,
        );

        Decision::trade(TradeProposal {
            symbol: snapshot.symbol,
            side,
            entry,
            stop_loss,
            take_profit,
            order_kind,
            confluence_score,
            reason_codes,
        })
    }
}

fn check_minimum(ctx: &TimeframeContext, need: usize) -> Option<Decision> {
    if ctx.candle_count < need {
        Some(Decision::no_signal(ReasonCode::InsufficientCandles {
            timeframe: ctx.timeframe.as_str().to_string(),
            have: ctx.candle_count,
            need,
        }))
    } else {
        None
    }
}

/// Most recent valid M15 structural setup aligned with the HTF bias: a
/// CHoCH (or BOS in the bias direction) inside the search window, a
/// displacement at or after it, an FVG created during the displacement leg,
/// and an unmitigated order block just before the displacement. The zone is
/// the FVG∩OB intersection when they overlap, otherwise the FVG, otherwise
/// the OB.
fn find_setup(
    itf: &TimeframeContext,
    direction: Polarity,
    window: usize,
    snapshot: &MarketSnapshot,
) -> Option<SetupContext> {
    let floor = itf.candle_count.saturating_sub(window);
    let event = itf
        .events
        .iter()
        .rev()
        .find(|e| e.direction == direction && e.candle_index >= floor)?;

    let disp = itf
        .zones
        .displacements
        .iter()
        .rev()
        .find(|d| d.direction == direction && d.candle_index >= event.candle_index)?;

    let fvg = itf
        .zones
        .fvgs
        .iter()
        .rev()
        .find(|g| {
            g.direction == direction
                && !g.resolved
                && g.middle_candle_index >= event.candle_index
                && g.middle_candle_index <= disp.candle_index + 1
        })
        .copied();

    // The order block sits just before the displacement leg.
    let order_block = itf
        .zones
        .order_blocks
        .iter()
        .rev()
        .find(|b| {
            b.direction == direction
                && !b.mitigated
                && b.origin_candle_index < disp.candle_index
                && b.origin_candle_index + 5 >= disp.candle_index
        })
        .copied();

    let created_at = snapshot.time;
    let zone = match (&fvg, &order_block) {
        (Some(g), Some(b)) => {
            let low = g.low.max(b.low);
            let high = g.high.min(b.high);
            if low < high {
                SetupZone {
                    direction,
                    zone_low: low,
                    zone_high: high,
                    source: ZoneSource::FvgObOverlap,
                    created_at,
                }
            } else {
                SetupZone {
                    direction,
                    zone_low: g.low,
                    zone_high: g.high,
                    source: ZoneSource::Fvg,
                    created_at,
                }
            }
        }
        (Some(g), None) => SetupZone {
            direction,
            zone_low: g.low,
            zone_high: g.high,
            source: ZoneSource::Fvg,
            created_at,
        },
        (None, Some(b)) => SetupZone {
            direction,
            zone_low: b.low,
            zone_high: b.high,
            source: ZoneSource::OrderBlock,
            created_at,
        },
        (None, None) => return None,
    };

    if zone.zone_low >= zone.zone_high {
        return None;
    }

    Some(SetupContext {
        zone,
        fvg,
        order_block,
        displacement_present: true,
    })
}

/// Refined M1 order block overlapping the setup zone, most recent first.
fn find_refined_ob(
    ltf: &TimeframeContext,
    direction: Polarity,
    zone: &SetupZone,
) -> Option<OrderBlock> {
    ltf.zones
        .order_blocks
        .iter()
        .rev()
        .find(|b| {
            b.direction == direction
                && !b.mitigated
                && b.high >= zone.zone_low
                && b.low <= zone.zone_high
        })
        .copied()
}

/// Entry ladder: refined M1 OB edge, else 50% of the M15 FVG, else the M15
/// OB edge, else the zone midpoint.
fn entry_price(side: Side, setup: &SetupContext, refined: Option<&OrderBlock>) -> Decimal {
    if let Some(ob) = refined {
        return match side {
            Side::Buy => ob.low,
            Side::Sell => ob.high,
        };
    }
    if let Some(fvg) = &setup.fvg {
        return fvg.midpoint();
    }
    if let Some(ob) = &setup.order_block {
        return match side {
            Side::Buy => ob.high,
            Side::Sell => ob.low,
        };
    }
    setup.zone.midpoint()
}

/// Stop ladder: buffer beyond the refined M1 OB's far side; else beyond the
/// nearest protective M15 swing outside the zone; else beyond the zone edge.
fn stop_loss(
    side: Side,
    _entry: Decimal,
    setup: &SetupContext,
    refined: Option<&OrderBlock>,
    itf: &TimeframeContext,
    rule: &SymbolRule,
) -> Decimal {
    let buffer = rule.sl_buffer;
    if let Some(ob) = refined {
        return match side {
            Side::Buy => ob.low - buffer,
            Side::Sell => ob.high + buffer,
        };
    }

    match side {
        Side::Buy => {
            // Highest M15 swing low strictly below the zone.
            let protective = itf
                .swings
                .iter()
                .filter(|s| s.kind == SwingKind::Low && s.price < setup.zone.zone_low)
                .map(|s| s.price)
                .max();
            match protective {
                Some(level) => level - buffer,
                None => setup.zone.zone_low - buffer,
            }
        }
        Side::Sell => {
            // Lowest M15 swing high strictly above the zone.
            let protective = itf
                .swings
                .iter()
                .filter(|s| s.kind == SwingKind::High && s.price > setup.zone.zone_high)
                .map(|s| s.price)
                .min();
            match protective {
                Some(level) => level + buffer,
                None => setup.zone.zone_high + buffer,
            }
        }
    }
}

/// Limit when the entry is on the favorable side of the market, stop when it
/// is beyond it, market otherwise.
fn select_order_kind(
    side: Side,
    entry: Decimal,
    snapshot: &MarketSnapshot,
    epsilon_fraction: Decimal,
) -> OrderKind {
    let epsilon = entry * epsilon_fraction;
    match side {
        Side::Buy => {
            if entry < snapshot.bid - epsilon {
                OrderKind::BuyLimit
            } else if entry > snapshot.ask + epsilon {
                OrderKind::BuyStop
            } else {
                OrderKind::Market
            }
        }
        Side::Sell => {
            if entry > snapshot.ask + epsilon {
                OrderKind::SellLimit
            } else if entry < snapshot.bid - epsilon {
                OrderKind::SellStop
            } else {
                OrderKind::Market
            }
        }
    }
}

/// Weighted sum of discrete confirmations, 0..=100. The strategy emits the
/// proposal even when the score is low; the execution filter owns the floor.
fn score_confluence(
    snapshot: &MarketSnapshot,
    direction: Polarity,
    setup: &SetupContext,
    refined_present: bool,
    rule: &SymbolRule,
    config: &RunConfig,
) -> (u8, Vec<ReasonCode>) {
    let mut score: u8 = 0;
    let mut codes = Vec::new();

    let mut add = |points: u8, code: ReasonCode, codes: &mut Vec<ReasonCode>, score: &mut u8| {
        *score += points;
        codes.push(code);
    };

    // HTF bias exists by construction at this point.
    add(15, ReasonCode::HtfAligned, &mut codes, &mut score);

    let pd_ok = snapshot.itf.pd.map(|pd| match direction {
        Polarity::Bullish => pd.zone == PdZone::Discount,
        Polarity::Bearish => pd.zone == PdZone::Premium,
    });
    if pd_ok == Some(true) {
        add(10, ReasonCode::PdZoneCorrect, &mut codes, &mut score);
    }

    if snapshot.itf.bias.polarity() == Some(direction) {
        add(10, ReasonCode::ItfAligned, &mut codes, &mut score);
    }

    if setup.displacement_present {
        add(10, ReasonCode::DisplacementPresent, &mut codes, &mut score);
    }

    let sweep_present = snapshot
        .itf
        .zones
        .sweeps
        .iter()
        .chain(snapshot.ltf.zones.sweeps.iter())
        .any(|s| s.direction == direction);
    if sweep_present {
        add(10, ReasonCode::SweepPresent, &mut codes, &mut score);
    }

    if setup.fvg.is_some() {
        add(10, ReasonCode::FvgPresent, &mut codes, &mut score);
    }

    if setup.order_block.map(|b| !b.mitigated).unwrap_or(false) {
        add(10, ReasonCode::ObPresent, &mut codes, &mut score);
    }

    if refined_present {
        add(10, ReasonCode::M1Refined, &mut codes, &mut score);
    }

    let windows = config.session_windows(snapshot.symbol);
    if in_any_session(&windows, snapshot.time) {
        add(5, ReasonCode::SessionValid, &mut codes, &mut score);
    }

    if snapshot.spread() <= rule.max_spread {
        add(5, ReasonCode::SpreadOk, &mut codes, &mut score);
    }

    let volume_aligned = match direction {
        Polarity::Bullish => snapshot.ltf.recent_bull_volume > snapshot.ltf.recent_bear_volume,
        Polarity::Bearish => snapshot.ltf.recent_bear_volume > snapshot.ltf.recent_bull_volume,
    };
    if volume_aligned {
        add(5, ReasonCode::VolumeImbalanceAligned, &mut codes, &mut score);
    }

    (score.min(100), codes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::test_support::*;
    use rust_decimal_macros::dec;

    #[test]
    fn sideways_htf_yields_no_signal() {
        let config = test_config();
        let snapshot = snapshot_with(
            htf_context(crate::types::Bias::Unknown, Trend::Sideways),
            bullish_itf_setup(),
            bullish_ltf_refined(),
            dec!(2002.4),
        );
        let decision = IctStrategy.evaluate(&snapshot, &config);
        assert_eq!(
            decision,
            Decision::no_signal(ReasonCode::HtfSideways),
            "unknown bias must short-circuit"
        );
    }

    #[test]
    fn missing_itf_setup_yields_no_m15_setup() {
        let config = test_config();
        let snapshot = snapshot_with(
            htf_context(crate::types::Bias::Bullish, Trend::Bullish),
            empty_itf(),
            bullish_ltf_refined(),
            dec!(2002.4),
        );
        let decision = IctStrategy.evaluate(&snapshot, &config);
        assert_eq!(decision, Decision::no_signal(ReasonCode::NoM15Setup));
    }

    #[test]
    fn price_outside_zone_blocks() {
        let config = test_config();
        let snapshot = snapshot_with(
            htf_context(crate::types::Bias::Bullish, Trend::Bullish),
            bullish_itf_setup(),
            bullish_ltf_refined(),
            dec!(2012),
        );
        let decision = IctStrategy.evaluate(&snapshot, &config);
        assert_eq!(decision, Decision::no_signal(ReasonCode::PriceNotInZone));
    }

    #[test]
    fn full_bullish_setup_produces_the_expected_levels() {
        // M15 FVG [2001, 2003] overlapping an unmitigated M15 OB, no refined
        // M1 OB: entry at 50% of the FVG (2002.00); the protective M15 swing
        // low at 2000.50 puts the stop at 1999.50 and a 3R target at 2009.50.
        let config = test_config();
        let snapshot = snapshot_with(
            htf_context(crate::types::Bias::Bullish, Trend::Bullish),
            bullish_itf_setup(),
            bullish_ltf_bos_only(),
            dec!(2002.4),
        );
        let decision = IctStrategy.evaluate(&snapshot, &config);
        let proposal = decision.proposal().expect("trade proposal");
        assert_eq!(proposal.side, Side::Buy);
        assert_eq!(proposal.entry, dec!(2002.00));
        assert_eq!(proposal.stop_loss, dec!(1999.50));
        assert_eq!(proposal.take_profit, dec!(2009.50));
        assert!(proposal.reason_codes.contains(&ReasonCode::FvgPresent));
        assert!(proposal.reason_codes.contains(&ReasonCode::HtfAligned));
    }

    #[test]
    fn refined_m1_ob_moves_entry_and_stop() {
        let config = test_config();
        let snapshot = snapshot_with(
            htf_context(crate::types::Bias::Bullish, Trend::Bullish),
            bullish_itf_setup(),
            bullish_ltf_refined(),
            dec!(2002.4),
        );
        let decision = IctStrategy.evaluate(&snapshot, &config);
        let proposal = decision.proposal().expect("trade proposal");
        // Refined OB is [2002.0, 2002.6]: entry at its low, stop a buffer
        // beyond it.
        assert_eq!(proposal.entry, dec!(2002.0));
        assert_eq!(proposal.stop_loss, dec!(2001.0));
        assert_eq!(proposal.take_profit, dec!(2005.0));
        assert!(proposal.reason_codes.contains(&ReasonCode::M1Refined));
    }

    #[test]
    fn missing_m1_confirmation_blocks() {
        let config = test_config();
        let snapshot = snapshot_with(
            htf_context(crate::types::Bias::Bullish, Trend::Bullish),
            bullish_itf_setup(),
            empty_ltf_at(dec!(2002.4)),
            dec!(2002.4),
        );
        let decision = IctStrategy.evaluate(&snapshot, &config);
        assert_eq!(decision, Decision::no_signal(ReasonCode::NoM1Confirmation));
    }

    #[test]
    fn reward_multiple_env_shapes_take_profit() {
        let mut config = test_config();
        config.strategy.reward_multiple = dec!(2.0);
        let snapshot = snapshot_with(
            htf_context(crate::types::Bias::Bullish, Trend::Bullish),
            bullish_itf_setup(),
            bullish_ltf_bos_only(),
            dec!(2002.4),
        );
        let proposal = IctStrategy
            .evaluate(&snapshot, &config)
            .proposal()
            .cloned()
            .expect("trade proposal");
        assert_eq!(proposal.take_profit, dec!(2007.00));
    }
}
