#![allow(dead_code)]
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crate::analytics::MarketSnapshot;
use crate::config::RunConfig;
use crate::execution::session::in_any_session;
use crate::news::GuardrailMode;
use crate::types::{Decision, PdZone, Polarity, Position, ReasonCode, Side, TradeProposal};

/// Everything the gate chain reads about the world at one tick. Pure data;
/// gates never mutate it.
#[derive(Debug)]
pub struct ExecutionContext<'a> {
    pub now: DateTime<Utc>,
    pub snapshot: &'a MarketSnapshot,
    pub proposal: &'a TradeProposal,
    /// Lots the sizing stage assigned to this proposal.
    pub lots: Decimal,
    pub open_positions: &'a [Position],
    pub trades_today: u32,
    pub last_trade_time: Option<DateTime<Utc>>,
    pub today_high: Option<Decimal>,
    pub today_low: Option<Decimal>,
    /// Realized PnL since midnight, signed.
    pub realized_pnl_today: Decimal,
    pub balance: Decimal,
    pub guardrail: GuardrailMode,
}

/// Ordered, short-circuiting gate chain (C9). The decision is `Skip` as soon
/// as any gate fails, but every gate still runs so the log carries the full
/// set of applicable reasons.
pub struct ExecutionFilter;

impl ExecutionFilter {
    pub fn evaluate(ctx: &ExecutionContext<'_>, config: &RunConfig) -> Decision {
        let mut reasons = Vec::new();
        let rule = config.rule(ctx.proposal.symbol);
        let risk_cfg = &config.risk;
        let relaxed = config.strategy.relaxed_filters;
        let direction = match ctx.proposal.side {
            Side::Buy => Polarity::Bullish,
            Side::Sell => Polarity::Bearish,
        };

        if ctx.guardrail == GuardrailMode::Blocked {
            reasons.push(ReasonCode::GuardrailBlocked);
        }

        if !rule.enabled {
            reasons.push(ReasonCode::SymbolDisabled);
        }

        if !rule.allows_side(ctx.proposal.side) {
            reasons.push(ReasonCode::DirectionNotAllowed);
        }

        if !relaxed
            && !rule.htf_trends_allowed.is_empty()
            && !rule.htf_trends_allowed.contains(&ctx.snapshot.htf.trend)
        {
            reasons.push(ReasonCode::HtfTrendNotAllowed);
        }

        if !relaxed {
            if rule.require_bos {
                let confirmed = ctx
                    .snapshot
                    .ltf
                    .events
                    .iter()
                    .chain(ctx.snapshot.itf.events.iter())
                    .any(|e| e.direction == direction);
                if !confirmed {
                    reasons.push(ReasonCode::MissingBosConfirm);
                }
            }
            if rule.require_sweep {
                let present = ctx
                    .snapshot
                    .itf
                    .zones
                    .sweeps
                    .iter()
                    .chain(ctx.snapshot.ltf.zones.sweeps.iter())
                    .any(|s| s.direction == direction);
                if !present {
                    reasons.push(ReasonCode::MissingSweep);
                }
            }
            if rule.require_displacement {
                let present = ctx
                    .snapshot
                    .itf
                    .zones
                    .displacements
                    .iter()
                    .any(|d| d.direction == direction);
                if !present {
                    reasons.push(ReasonCode::MissingDisplacement);
                }
            }
        }

        if !relaxed && rule.enforce_premium_discount {
            let ok = ctx.snapshot.itf.pd.map(|pd| match ctx.proposal.side {
                Side::Buy => pd.zone == PdZone::Discount,
                Side::Sell => pd.zone == PdZone::Premium,
            });
            if ok != Some(true) {
                reasons.push(ReasonCode::WrongPdZone);
            }
        }

        if !relaxed && rule.require_fvg {
            let present = ctx
                .snapshot
                .itf
                .zones
                .fvgs
                .iter()
                .any(|g| g.direction == direction && !g.resolved);
            if !present {
                reasons.push(ReasonCode::FvgMissing);
            }
        }

        let windows = config.session_windows(ctx.proposal.symbol);
        if !in_any_session(&windows, ctx.now) {
            reasons.push(ReasonCode::OutsideSession);
        }

        let spread = ctx.snapshot.spread();
        if spread > rule.max_spread {
            reasons.push(ReasonCode::SpreadExceeded {
                observed: spread,
                max: rule.max_spread,
            });
        }

        if risk_cfg.daily_extreme_buffer_fraction > Decimal::ZERO {
            let min_distance = ctx.proposal.entry * risk_cfg.daily_extreme_buffer_fraction;
            let too_close_high = ctx
                .today_high
                .map(|h| (h - ctx.proposal.entry).abs() < min_distance)
                .unwrap_or(false);
            let too_close_low = ctx
                .today_low
                .map(|l| (ctx.proposal.entry - l).abs() < min_distance)
                .unwrap_or(false);
            if too_close_high || too_close_low {
                reasons.push(ReasonCode::TooCloseToDailyExtreme);
            }
        }

        if ctx.trades_today >= risk_cfg.max_trades_per_day {
            reasons.push(ReasonCode::DailyTradeCapReached {
                count: ctx.trades_today,
                cap: risk_cfg.max_trades_per_day,
            });
        }
        if let Some(last) = ctx.last_trade_time {
            let elapsed = (ctx.now - last).num_minutes();
            if elapsed < risk_cfg.cooldown_minutes {
                reasons.push(ReasonCode::CooldownActive {
                    minutes_remaining: risk_cfg.cooldown_minutes - elapsed,
                });
            }
        }
        if risk_cfg.daily_loss_cap_pct > Decimal::ZERO && ctx.realized_pnl_today < Decimal::ZERO {
            let cap = ctx.balance * risk_cfg.daily_loss_cap_pct / Decimal::ONE_HUNDRED;
            let loss = -ctx.realized_pnl_today;
            if loss >= cap {
                reasons.push(ReasonCode::DailyLossCapReached { loss, cap });
            }
        }

        let open: Vec<&Position> = ctx.open_positions.iter().filter(|p| p.is_open()).collect();
        let open_symbol = open
            .iter()
            .filter(|p| p.symbol == ctx.proposal.symbol)
            .count();
        if open_symbol >= risk_cfg.max_open_per_symbol {
            reasons.push(ReasonCode::ConcurrencySymbolCap);
        }
        let open_direction = open
            .iter()
            .filter(|p| p.symbol == ctx.proposal.symbol && p.side == ctx.proposal.side)
            .count();
        if open_direction >= risk_cfg.max_open_per_direction {
            reasons.push(ReasonCode::ConcurrencyDirectionCap);
        }
        if open.len() >= risk_cfg.max_open_global {
            reasons.push(ReasonCode::ConcurrencyGlobalCap);
        }

        // Estimated risk of this proposal plus everything already open.
        let proposal_risk = ctx.lots
            * ctx.proposal.risk_distance()
            * ctx.proposal.symbol.contract_value();
        if risk_cfg.max_risk_per_symbol > Decimal::ZERO {
            let symbol_risk: Decimal = open
                .iter()
                .filter(|p| p.symbol == ctx.proposal.symbol)
                .map(|p| p.risk_at_stop())
                .sum::<Decimal>()
                + proposal_risk;
            if symbol_risk > risk_cfg.max_risk_per_symbol {
                reasons.push(ReasonCode::ExposureSymbolCap {
                    risk: symbol_risk,
                    cap: risk_cfg.max_risk_per_symbol,
                });
            }
        }
        if risk_cfg.max_risk_global > Decimal::ZERO {
            let global_risk: Decimal =
                open.iter().map(|p| p.risk_at_stop()).sum::<Decimal>() + proposal_risk;
            if global_risk > risk_cfg.max_risk_global {
                reasons.push(ReasonCode::ExposureGlobalCap {
                    risk: global_risk,
                    cap: risk_cfg.max_risk_global,
                });
            }
        }

        if ctx.proposal.confluence_score < risk_cfg.min_confluence {
            reasons.push(ReasonCode::ConfluenceTooLow {
                score: ctx.proposal.confluence_score,
                min: risk_cfg.min_confluence,
            });
        }

        if reasons.is_empty() {
            Decision::trade(ctx.proposal.clone())
        } else {
            debug!(
                "[{}] proposal skipped: {}",
                ctx.proposal.symbol,
                reasons
                    .iter()
                    .map(|r| r.tag())
                    .collect::<Vec<_>>()
                    .join(",")
            );
            Decision::skip(reasons)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::test_support::*;
    use crate::types::{Bias, OrderKind, Trend};
    use rust_decimal_macros::dec;

    fn proposal() -> TradeProposal {
        TradeProposal {
            symbol: crate::types::Symbol::XAUUSD,
            side: Side::Buy,
            entry: dec!(2002),
            stop_loss: dec!(1999.5),
            take_profit: dec!(2009.5),
            order_kind: OrderKind::Market,
            confluence_score: 80,
            reason_codes: vec![],
        }
    }

    fn open_position(ticket: u64, side: Side) -> Position {
        Position {
            ticket,
            symbol: crate::types::Symbol::XAUUSD,
            side,
            entry: dec!(2001),
            sl: dec!(1999),
            tp: dec!(2007),
            lots: dec!(0.1),
            opened_at: test_time(),
            closed_at: None,
            exit_price: None,
            exit_reason: None,
            pnl: None,
        }
    }

    fn context<'a>(
        snapshot: &'a MarketSnapshot,
        proposal: &'a TradeProposal,
        open: &'a [Position],
    ) -> ExecutionContext<'a> {
        ExecutionContext {
            now: test_time(),
            snapshot,
            proposal,
            lots: dec!(0.1),
            open_positions: open,
            trades_today: 0,
            last_trade_time: None,
            today_high: None,
            today_low: None,
            realized_pnl_today: Decimal::ZERO,
            balance: dec!(10000),
            guardrail: GuardrailMode::Normal,
        }
    }

    fn full_snapshot() -> MarketSnapshot {
        snapshot_with(
            htf_context(Bias::Bullish, Trend::Bullish),
            bullish_itf_setup(),
            bullish_ltf_refined(),
            dec!(2002.4),
        )
    }

    #[test]
    fn clean_context_passes_all_gates() {
        let config = test_config();
        let snapshot = full_snapshot();
        let p = proposal();
        let ctx = context(&snapshot, &p, &[]);
        let decision = ExecutionFilter::evaluate(&ctx, &config);
        assert!(decision.is_trade());
    }

    #[test]
    fn symbol_concurrency_cap_skips_second_trade() {
        let config = test_config();
        let snapshot = full_snapshot();
        let p = proposal();
        let open = vec![open_position(1, Side::Buy)];
        let ctx = context(&snapshot, &p, &open);
        let decision = ExecutionFilter::evaluate(&ctx, &config);
        match decision {
            Decision::Skip { reasons } => {
                assert!(reasons.contains(&ReasonCode::ConcurrencySymbolCap));
            }
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[test]
    fn guardrail_blocked_skips_regardless_of_setup() {
        let config = test_config();
        let snapshot = full_snapshot();
        let p = proposal();
        let mut ctx = context(&snapshot, &p, &[]);
        ctx.guardrail = GuardrailMode::Blocked;
        let decision = ExecutionFilter::evaluate(&ctx, &config);
        match decision {
            Decision::Skip { reasons } => {
                assert!(reasons.contains(&ReasonCode::GuardrailBlocked));
            }
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[test]
    fn all_applicable_reasons_are_collected() {
        let mut config = test_config();
        config.risk.min_confluence = 90;
        let snapshot = full_snapshot();
        let mut p = proposal();
        p.confluence_score = 10;
        let open = vec![open_position(1, Side::Buy)];
        let mut ctx = context(&snapshot, &p, &open);
        ctx.guardrail = GuardrailMode::Blocked;
        ctx.trades_today = 99;

        let decision = ExecutionFilter::evaluate(&ctx, &config);
        match decision {
            Decision::Skip { reasons } => {
                assert!(reasons.contains(&ReasonCode::GuardrailBlocked));
                assert!(reasons.contains(&ReasonCode::ConcurrencySymbolCap));
                assert!(reasons
                    .iter()
                    .any(|r| matches!(r, ReasonCode::DailyTradeCapReached { .. })));
                assert!(reasons
                    .iter()
                    .any(|r| matches!(r, ReasonCode::ConfluenceTooLow { .. })));
            }
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[test]
    fn cooldown_blocks_until_elapsed() {
        let config = test_config();
        let snapshot = full_snapshot();
        let p = proposal();
        let mut ctx = context(&snapshot, &p, &[]);
        ctx.last_trade_time = Some(test_time() - chrono::Duration::minutes(10));
        let decision = ExecutionFilter::evaluate(&ctx, &config);
        match decision {
            Decision::Skip { reasons } => {
                assert!(reasons
                    .iter()
                    .any(|r| matches!(r, ReasonCode::CooldownActive { minutes_remaining: 20 })));
            }
            other => panic!("expected skip, got {other:?}"),
        }

        ctx.last_trade_time = Some(test_time() - chrono::Duration::minutes(31));
        assert!(ExecutionFilter::evaluate(&ctx, &config).is_trade());
    }

    #[test]
    fn relaxed_filters_disable_optional_structural_gates() {
        let mut config = test_config();
        config.strategy.relaxed_filters = true;
        // A snapshot with no structural artifacts at all.
        let snapshot = snapshot_with(
            htf_context(Bias::Bullish, Trend::Bullish),
            empty_itf(),
            empty_ltf_at(dec!(2002.4)),
            dec!(2002.4),
        );
        let p = proposal();
        let ctx = context(&snapshot, &p, &[]);
        let decision = ExecutionFilter::evaluate(&ctx, &config);
        assert!(decision.is_trade());

        config.strategy.relaxed_filters = false;
        let decision = ExecutionFilter::evaluate(&ctx, &config);
        match decision {
            Decision::Skip { reasons } => {
                assert!(reasons.contains(&ReasonCode::MissingBosConfirm));
                assert!(reasons.contains(&ReasonCode::MissingDisplacement));
                assert!(reasons.contains(&ReasonCode::FvgMissing));
            }
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[test]
    fn exposure_cap_counts_open_risk_plus_proposal() {
        let mut config = test_config();
        // Open position risk: 2.0 * 0.1 * 100 = 20; proposal: 2.5 * 0.1 * 100 = 25.
        config.risk.max_risk_per_symbol = dec!(40);
        config.risk.max_open_per_symbol = 5;
        config.risk.max_open_per_direction = 5;
        let snapshot = full_snapshot();
        let p = proposal();
        let open = vec![open_position(1, Side::Buy)];
        let ctx = context(&snapshot, &p, &open);
        let decision = ExecutionFilter::evaluate(&ctx, &config);
        match decision {
            Decision::Skip { reasons } => {
                assert!(reasons
                    .iter()
                    .any(|r| matches!(r, ReasonCode::ExposureSymbolCap { .. })));
            }
            other => panic!("expected skip, got {other:?}"),
        }
    }
}
