#![allow(dead_code)]
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::SchedulerSettings;
use crate::errors::BrokerError;
use crate::types::{
    Candle, ExitReason, OrderKind, Position, Side, Symbol, TradeProposal,
};

#[derive(Debug, Clone)]
struct PendingOrder {
    ticket: u64,
    symbol: Symbol,
    side: Side,
    order_kind: OrderKind,
    /// Limit/stop level; `None` fills at next open.
    price: Option<Decimal>,
    sl: Decimal,
    tp: Decimal,
    lots: Decimal,
    submitted_at: DateTime<Utc>,
}

/// In-replay broker (C11). Orders fill on the candle after submission;
/// when a candle's range contains both the stop and the target, the stop
/// wins. That pessimistic rule is part of the determinism contract.
#[derive(Debug)]
pub struct SimBroker {
    settings: SchedulerSettings,
    balance: Decimal,
    next_ticket: u64,
    pending: Vec<PendingOrder>,
    open: Vec<Position>,
    closed: Vec<Position>,
}

impl SimBroker {
    pub fn new(settings: SchedulerSettings) -> Self {
        let balance = settings.initial_balance;
        Self {
            settings,
            balance,
            next_ticket: 1,
            pending: Vec::new(),
            open: Vec::new(),
            closed: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.balance = self.settings.initial_balance;
        self.next_ticket = 1;
        self.pending.clear();
        self.open.clear();
        self.closed.clear();
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn open_positions(&self) -> &[Position] {
        &self.open
    }

    pub fn closed_positions(&self) -> &[Position] {
        &self.closed
    }

    /// Mark-to-market equity at the supplied closes.
    pub fn equity(&self, marks: &BTreeMap<Symbol, Decimal>) -> Decimal {
        let unrealized: Decimal = self
            .open
            .iter()
            .map(|p| {
                marks
                    .get(&p.symbol)
                    .map(|mark| p.unrealized_pnl(*mark))
                    .unwrap_or(Decimal::ZERO)
            })
            .sum();
        self.balance + unrealized
    }

    /// Accept a proposal. A missing or wrongly-sided stop is rejected here,
    /// before anything reaches a fill.
    pub fn submit(
        &mut self,
        proposal: &TradeProposal,
        lots: Decimal,
        now: DateTime<Utc>,
    ) -> Result<u64, BrokerError> {
        if !proposal.is_correctly_sided() {
            return Err(BrokerError::InvalidStopLoss);
        }
        if lots <= Decimal::ZERO {
            return Err(BrokerError::RejectedByBroker("lots must be > 0".to_string()));
        }

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        let price = match proposal.order_kind {
            OrderKind::Market => None,
            _ => Some(proposal.entry),
        };
        self.pending.push(PendingOrder {
            ticket,
            symbol: proposal.symbol,
            side: proposal.side,
            order_kind: proposal.order_kind,
            price,
            sl: proposal.stop_loss,
            tp: proposal.take_profit,
            lots,
            submitted_at: now,
        });
        Ok(ticket)
    }

    /// Advance one candle for its symbol: fill due pending orders at this
    /// candle, then resolve stops and targets intrabar. Positions are
    /// visited in ticket order.
    pub fn on_candle(&mut self, candle: &Candle) {
        self.fill_pending(candle);
        self.resolve_intrabar(candle);
    }

    fn fill_pending(&mut self, candle: &Candle) {
        let half_spread = self.settings.fill_half_spread(candle.symbol);
        let mut remaining = Vec::with_capacity(self.pending.len());

        for order in self.pending.drain(..) {
            if order.symbol != candle.symbol || order.submitted_at >= candle.timestamp {
                remaining.push(order);
                continue;
            }

            let fill = match (order.order_kind, order.price) {
                (OrderKind::Market, _) => Some(match order.side {
                    Side::Buy => candle.open + half_spread,
                    Side::Sell => candle.open - half_spread,
                }),
                (_, Some(level)) if candle.contains(level) => Some(match order.side {
                    Side::Buy => level + half_spread,
                    Side::Sell => level - half_spread,
                }),
                _ => None,
            };

            match fill {
                Some(entry) => {
                    debug!(
                        "[{}] ticket {} filled {} {} @ {}",
                        order.symbol, order.ticket, order.order_kind, order.side, entry
                    );
                    self.open.push(Position {
                        ticket: order.ticket,
                        symbol: order.symbol,
                        side: order.side,
                        entry,
                        sl: order.sl,
                        tp: order.tp,
                        lots: order.lots,
                        opened_at: candle.timestamp,
                        closed_at: None,
                        exit_price: None,
                        exit_reason: None,
                        pnl: None,
                    });
                }
                None => remaining.push(order),
            }
        }

        self.pending = remaining;
    }

    fn resolve_intrabar(&mut self, candle: &Candle) {
        let mut still_open = Vec::with_capacity(self.open.len());

        for position in std::mem::take(&mut self.open) {
            if position.symbol != candle.symbol {
                still_open.push(position);
                continue;
            }

            let (sl_hit, tp_hit) = match position.side {
                Side::Buy => (candle.low <= position.sl, candle.high >= position.tp),
                Side::Sell => (candle.high >= position.sl, candle.low <= position.tp),
            };

            // Ambiguous candle: stop first, always.
            let exit = if sl_hit {
                Some((position.sl, ExitReason::StopLoss))
            } else if tp_hit {
                Some((position.tp, ExitReason::TakeProfit))
            } else {
                None
            };

            match exit {
                Some((price, reason)) => {
                    let closed = self.close_at(position, price, reason, candle.timestamp);
                    self.closed.push(closed);
                }
                None => still_open.push(position),
            }
        }

        self.open = still_open;
    }

    /// Close every open position at the provided marks (end of replay).
    pub fn close_all(&mut self, marks: &BTreeMap<Symbol, Decimal>, time: DateTime<Utc>) {
        for position in std::mem::take(&mut self.open) {
            let mark = marks
                .get(&position.symbol)
                .copied()
                .unwrap_or(position.entry);
            let closed = self.close_at(position, mark, ExitReason::MarketClose, time);
            self.closed.push(closed);
        }
        self.pending.clear();
    }

    fn close_at(
        &mut self,
        mut position: Position,
        exit_price: Decimal,
        reason: ExitReason,
        time: DateTime<Utc>,
    ) -> Position {
        let gross = (exit_price - position.entry)
            * position.side.sign()
            * position.lots
            * position.symbol.contract_value();
        let commission = self.settings.commission_per_lot * position.lots;
        let nights = Decimal::from(
            (time.date_naive() - position.opened_at.date_naive())
                .num_days()
                .max(0),
        );
        let swap = self.settings.swap_per_lot_per_night * position.lots * nights;
        let pnl = gross - commission - swap;

        self.balance += pnl;
        position.closed_at = Some(time);
        position.exit_price = Some(exit_price);
        position.exit_reason = Some(reason);
        position.pnl = Some(pnl);

        debug!(
            "[{}] ticket {} closed {:?} @ {} pnl {}",
            position.symbol, position.ticket, reason, exit_price, pnl
        );
        position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_util::{candle, minute};
    use rust_decimal_macros::dec;

    fn settings() -> SchedulerSettings {
        let mut s = SchedulerSettings {
            initial_balance: dec!(10000),
            commission_per_lot: Decimal::ZERO,
            swap_per_lot_per_night: Decimal::ZERO,
            ..SchedulerSettings::default()
        };
        s.spread.insert(Symbol::XAUUSD, Decimal::ZERO);
        s
    }

    fn proposal(order_kind: OrderKind) -> TradeProposal {
        TradeProposal {
            symbol: Symbol::XAUUSD,
            side: Side::Buy,
            entry: dec!(2002),
            stop_loss: dec!(1999.5),
            take_profit: dec!(2009.5),
            order_kind,
            confluence_score: 80,
            reason_codes: vec![],
        }
    }

    #[test]
    fn stop_is_mandatory_and_must_be_sided() {
        let mut broker = SimBroker::new(settings());
        let mut bad = proposal(OrderKind::Market);
        bad.stop_loss = dec!(2005); // wrong side for a buy
        assert!(matches!(
            broker.submit(&bad, dec!(0.1), minute(0)),
            Err(BrokerError::InvalidStopLoss)
        ));
    }

    #[test]
    fn market_order_fills_at_next_open() {
        let mut broker = SimBroker::new(settings());
        broker
            .submit(&proposal(OrderKind::Market), dec!(0.1), minute(0))
            .unwrap();

        // Same-minute candle does not fill; the next one does, at its open.
        broker.on_candle(&candle(0, dec!(2002.2), dec!(2002.5), dec!(2002), dec!(2002.3)));
        assert!(broker.open_positions().is_empty());

        broker.on_candle(&candle(1, dec!(2002.4), dec!(2002.8), dec!(2002.1), dec!(2002.6)));
        assert_eq!(broker.open_positions().len(), 1);
        assert_eq!(broker.open_positions()[0].entry, dec!(2002.4));
    }

    #[test]
    fn limit_order_needs_the_range_to_touch_the_level() {
        let mut broker = SimBroker::new(settings());
        broker
            .submit(&proposal(OrderKind::BuyLimit), dec!(0.1), minute(0))
            .unwrap();

        // Range stays above the 2002 limit.
        broker.on_candle(&candle(1, dec!(2003), dec!(2004), dec!(2002.5), dec!(2003.5)));
        assert!(broker.open_positions().is_empty());

        // Range touches it.
        broker.on_candle(&candle(2, dec!(2002.5), dec!(2003), dec!(2001.8), dec!(2002.6)));
        assert_eq!(broker.open_positions().len(), 1);
        assert_eq!(broker.open_positions()[0].entry, dec!(2002));
    }

    #[test]
    fn ambiguous_candle_closes_at_stop_first() {
        let mut broker = SimBroker::new(settings());
        broker
            .submit(&proposal(OrderKind::Market), dec!(0.1), minute(0))
            .unwrap();
        broker.on_candle(&candle(1, dec!(2002), dec!(2002.5), dec!(2001.9), dec!(2002.2)));
        assert_eq!(broker.open_positions().len(), 1);

        // Range contains both SL (1999.5) and TP (2009.5).
        broker.on_candle(&candle(2, dec!(2001.8), dec!(2010.0), dec!(1999.0), dec!(2005.0)));
        assert!(broker.open_positions().is_empty());
        let closed = &broker.closed_positions()[0];
        assert_eq!(closed.exit_reason, Some(ExitReason::StopLoss));
        assert_eq!(closed.exit_price, Some(dec!(1999.5)));
    }

    #[test]
    fn take_profit_fill_realizes_the_reward() {
        let mut broker = SimBroker::new(settings());
        broker
            .submit(&proposal(OrderKind::Market), dec!(0.1), minute(0))
            .unwrap();
        broker.on_candle(&candle(1, dec!(2002), dec!(2002.5), dec!(2001.9), dec!(2002.2)));
        broker.on_candle(&candle(2, dec!(2002.2), dec!(2009.6), dec!(2002.0), dec!(2009.0)));

        let closed = &broker.closed_positions()[0];
        assert_eq!(closed.exit_reason, Some(ExitReason::TakeProfit));
        // (2009.5 - 2002) * 0.1 lots * 100 oz = 75.
        assert_eq!(closed.pnl, Some(dec!(75.0)));
        assert_eq!(broker.balance(), dec!(10075.0));
    }

    #[test]
    fn close_all_marks_to_market() {
        let mut broker = SimBroker::new(settings());
        broker
            .submit(&proposal(OrderKind::Market), dec!(0.1), minute(0))
            .unwrap();
        broker.on_candle(&candle(1, dec!(2002), dec!(2002.5), dec!(2001.9), dec!(2002.2)));

        let mut marks = BTreeMap::new();
        marks.insert(Symbol::XAUUSD, dec!(2004));
        broker.close_all(&marks, minute(2));
        let closed = &broker.closed_positions()[0];
        assert_eq!(closed.exit_reason, Some(ExitReason::MarketClose));
        assert_eq!(closed.pnl, Some(dec!(20.0)));
    }

    #[test]
    fn commission_and_swap_reduce_pnl() {
        let mut s = settings();
        s.commission_per_lot = dec!(5);
        s.swap_per_lot_per_night = dec!(2);
        let mut broker = SimBroker::new(s);
        broker
            .submit(&proposal(OrderKind::Market), dec!(1), minute(0))
            .unwrap();
        broker.on_candle(&candle(1, dec!(2002), dec!(2002.5), dec!(2001.9), dec!(2002.2)));

        // Close two days later at the target.
        let mut exit = candle(2, dec!(2002.2), dec!(2009.6), dec!(2002.0), dec!(2009.0));
        exit.timestamp = minute(2880);
        broker.on_candle(&exit);

        let closed = &broker.closed_positions()[0];
        // Gross 750 - commission 5 - swap 2*1*2 nights = 741.
        assert_eq!(closed.pnl, Some(dec!(741.0)));
    }
}
