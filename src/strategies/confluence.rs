#![allow(dead_code)]
use crate::analytics::MarketSnapshot;
use crate::config::RunConfig;
use crate::execution::session::in_any_session;
use crate::types::{
    Decision, OrderKind, PdZone, Polarity, ReasonCode, Side, SwingKind, TradeProposal,
};

/// Legacy trend-confluence strategy, kept behind the pipeline toggle. Trades
/// market orders when the higher timeframes agree, with the stop behind the
/// nearest LTF swing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfluenceStrategy;

impl ConfluenceStrategy {
    pub fn evaluate(&self, snapshot: &MarketSnapshot, config: &RunConfig) -> Decision {
        let s = &config.strategy;
        let rule = config.rule(snapshot.symbol);

        if snapshot.htf.candle_count < s.min_htf_candles
            || snapshot.itf.candle_count < s.min_itf_candles
            || snapshot.ltf.candle_count < s.min_ltf_candles
        {
            return Decision::no_signal(ReasonCode::InsufficientCandles {
                timeframe: snapshot.htf.timeframe.as_str().to_string(),
                have: snapshot.htf.candle_count,
                need: s.min_htf_candles,
            });
        }

        let Some(direction) = snapshot.htf.trend.polarity() else {
            return Decision::no_signal(ReasonCode::HtfSideways);
        };
        if snapshot.itf.trend.polarity() != Some(direction) {
            return Decision::no_signal(ReasonCode::NoM15Setup);
        }

        let Some(price) = snapshot.ltf.last_close else {
            return Decision::no_signal(ReasonCode::BufferEmpty);
        };

        let side = match direction {
            Polarity::Bullish => Side::Buy,
            Polarity::Bearish => Side::Sell,
        };
        let entry = snapshot.mid();

        // Stop behind the nearest LTF swing on the risk side.
        let protective = match side {
            Side::Buy => snapshot
                .ltf
                .swings
                .iter()
                .filter(|sw| sw.kind == SwingKind::Low && sw.price < entry)
                .map(|sw| sw.price)
                .max(),
            Side::Sell => snapshot
                .ltf
                .swings
                .iter()
                .filter(|sw| sw.kind == SwingKind::High && sw.price > entry)
                .map(|sw| sw.price)
                .min(),
        };
        let Some(level) = protective else {
            return Decision::no_signal(ReasonCode::SwingUnderflow);
        };
        let stop_loss = match side {
            Side::Buy => level - rule.sl_buffer,
            Side::Sell => level + rule.sl_buffer,
        };

        let risk = (entry - stop_loss).abs();
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

        let take_profit = match side {
            Side::Buy => entry + s.reward_multiple * risk,
            Side::Sell => entry - s.reward_multiple * risk,
        };

        let mut score: u8 = 30; // HTF trend agreed by construction.
        let mut codes = vec![ReasonCode::HtfAligned, ReasonCode::ItfAligned];
        score += 25;

        let pd_ok = snapshot.itf.pd.map(|pd| match direction {
            Polarity::Bullish => pd.zone == PdZone::Discount,
            Polarity::Bearish => pd.zone == PdZone::Premium,
        });
        if pd_ok == Some(true) {
            score += 20;
            codes.push(ReasonCode::PdZoneCorrect);
        }

        let sweep_present = snapshot
            .ltf
            .zones
            .sweeps
            .iter()
            .any(|sw| sw.direction == direction);
        if sweep_present {
            score += 15;
            codes.push(ReasonCode::SweepPresent);
        }

        let windows = config.session_windows(snapshot.symbol);
        if in_any_session(&windows, snapshot.time) {
            score += 10;
            codes.push(ReasonCode::SessionValid);
        }

        Decision::trade(TradeProposal {
            symbol: snapshot.symbol,
            side,
            entry,
            stop_loss,
            take_profit,
            order_kind: OrderKind::Market,
            confluence_score: score.min(100),
            reason_codes: codes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::test_support::*;
    use crate::types::{Bias, Swing};
    use rust_decimal_macros::dec;

    #[test]
    fn aligned_trends_produce_a_market_order() {
        let config = test_config();
        let mut ltf = bullish_ltf_bos_only();
        ltf.swings = vec![Swing {
            index: 50,
            timestamp: test_time(),
            price: dec!(2000.2),
            kind: crate::types::SwingKind::Low,
            strength: 2,
        }];
        let snapshot = snapshot_with(
            htf_context(Bias::Bullish, crate::types::Trend::Bullish),
            bullish_itf_setup(),
            ltf,
            dec!(2002.4),
        );
        let decision = ConfluenceStrategy.evaluate(&snapshot, &config);
        let proposal = decision.proposal().expect("trade proposal");
        assert_eq!(proposal.order_kind, OrderKind::Market);
        assert_eq!(proposal.side, Side::Buy);
        // Entry at mid (2002.55), stop behind 2000.2 minus the gold buffer.
        assert_eq!(proposal.stop_loss, dec!(1999.2));
    }

    #[test]
    fn sideways_htf_trend_blocks() {
        let config = test_config();
        let snapshot = snapshot_with(
            htf_context(Bias::Bullish, crate::types::Trend::Sideways),
            bullish_itf_setup(),
            bullish_ltf_bos_only(),
            dec!(2002.4),
        );
        let decision = ConfluenceStrategy.evaluate(&snapshot, &config);
        assert_eq!(decision, Decision::no_signal(ReasonCode::HtfSideways));
    }

    #[test]
    fn missing_protective_swing_is_swing_underflow() {
        let config = test_config();
        let snapshot = snapshot_with(
            htf_context(Bias::Bullish, crate::types::Trend::Bullish),
            bullish_itf_setup(),
            bullish_ltf_bos_only(),
            dec!(2002.4),
        );
        let decision = ConfluenceStrategy.evaluate(&snapshot, &config);
        assert_eq!(decision, Decision::no_signal(ReasonCode::SwingUnderflow));
    }
}
