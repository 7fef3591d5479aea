#![allow(dead_code)]
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::results::DecisionRecord;
use super::scheduler::CancelToken;
use crate::analytics::ContextBuilder;
use crate::broker::{BrokerAdapter, OpenTradeRequest};
use crate::config::RunConfig;
use crate::errors::BrokerError;
use crate::execution::{ExecutionContext, ExecutionFilter};
use crate::market::{CandleAggregator, CandleStore};
use crate::news::{GuardrailAdapter, GuardrailMode};
use crate::persistence::DecisionLogger;
use crate::strategies::StrategyKind;
use crate::types::{Candle, Decision, OrderKind, ReasonCode, Symbol, TradeProposal};

/// Source of closed M1 candles for the live loop. `None` ends the session.
#[async_trait]
pub trait CandleFeed: Send {
    async fn next_m1(&mut self) -> anyhow::Result<Option<Candle>>;
}

#[derive(Debug, Clone)]
struct LiveDayState {
    date: NaiveDate,
    high: Decimal,
    low: Decimal,
    trades_today: u32,
    realized_pnl_today: Decimal,
}

/// Live scheduler: the same C7->C8->C9 path as replay, re-entered on a
/// single loop that serializes evaluations per (symbol, M1 close). Only the
/// I/O seams (broker, guardrail, persistence) suspend; no analytic function
/// does.
pub struct LiveEngine {
    config: RunConfig,
    strategy: StrategyKind,
    store: CandleStore,
    aggregator: CandleAggregator,
    builders: BTreeMap<Symbol, ContextBuilder>,
    day_state: BTreeMap<Symbol, LiveDayState>,
    last_trade_time: BTreeMap<Symbol, DateTime<Utc>>,
}

impl LiveEngine {
    pub fn new(config: RunConfig) -> Self {
        let strategy = StrategyKind::from_config(&config);
        let builders = config
            .general
            .symbols
            .iter()
            .map(|s| (*s, config.context_builder(*s)))
            .collect();
        Self {
            config,
            strategy,
            store: CandleStore::default(),
            aggregator: CandleAggregator::new(),
            builders,
            day_state: BTreeMap::new(),
            last_trade_time: BTreeMap::new(),
        }
    }

    pub async fn run(
        &mut self,
        feed: &mut dyn CandleFeed,
        broker: &dyn BrokerAdapter,
        guardrail: &dyn GuardrailAdapter,
        logger: Option<&DecisionLogger>,
        cancel: &CancelToken,
    ) -> anyhow::Result<()> {
        info!("live loop started ({})", self.strategy.name());

        while let Some(candle) = feed.next_m1().await? {
            if cancel.is_cancelled() {
                info!("live loop cancelled");
                break;
            }
            let (mode, decision) = self.on_candle(&candle, broker, guardrail).await;
            if let Some(logger) = logger {
                logger.try_log(DecisionRecord::new(
                    candle.timestamp,
                    candle.symbol,
                    self.strategy.name(),
                    mode,
                    decision,
                ));
            }
        }

        Ok(())
    }

    async fn on_candle(
        &mut self,
        candle: &Candle,
        broker: &dyn BrokerAdapter,
        guardrail: &dyn GuardrailAdapter,
    ) -> (GuardrailMode, Decision) {
        let symbol = candle.symbol;

        for closed in self.aggregator.roll(candle) {
            if let Err(e) = self.store.append(closed) {
                // Live ingestion going backward is an upstream bug.
                warn!("fatal ingestion error: {e}");
                return (
                    GuardrailMode::Normal,
                    Decision::skip(vec![ReasonCode::BufferEmpty]),
                );
            }
        }
        if let Err(e) = self.store.append(candle.clone()) {
            warn!("fatal ingestion error: {e}");
            return (
                GuardrailMode::Normal,
                Decision::skip(vec![ReasonCode::BufferEmpty]),
            );
        }

        let date = candle.timestamp.date_naive();
        let day = self
            .day_state
            .entry(symbol)
            .and_modify(|d| {
                if d.date != date {
                    *d = LiveDayState {
                        date,
                        high: candle.high,
                        low: candle.low,
                        trades_today: 0,
                        realized_pnl_today: Decimal::ZERO,
                    };
                } else {
                    d.high = d.high.max(candle.high);
                    d.low = d.low.min(candle.low);
                }
            })
            .or_insert_with(|| LiveDayState {
                date,
                high: candle.high,
                low: candle.low,
                trades_today: 0,
                realized_pnl_today: Decimal::ZERO,
            })
            .clone();

        let verdict = guardrail.can_trade_now(self.strategy.name()).await;
        let mode = verdict.mode;
        if mode == GuardrailMode::Blocked {
            return (mode, Decision::skip(vec![ReasonCode::GuardrailBlocked]));
        }

        let half_spread = self.config.scheduler.spread_for(symbol) / Decimal::TWO;
        let bid = candle.close - half_spread;
        let ask = candle.close + half_spread;
        let Some(builder) = self.builders.get(&symbol) else {
            return (mode, Decision::skip(vec![ReasonCode::SymbolDisabled]));
        };
        let snapshot = builder.build(&self.store, symbol, candle.timestamp, bid, ask);

        let proposal = match self.strategy.evaluate(&snapshot, &self.config) {
            Decision::Trade { proposal } => proposal,
            other => return (mode, other),
        };

        let open_positions = match broker.list_open_positions().await {
            Ok(positions) => positions,
            Err(e) => {
                warn!("[{symbol}] cannot read open positions: {e}");
                return (mode, Decision::skip(vec![ReasonCode::BrokerDown]));
            }
        };

        let lots = self.size_lots(&proposal, mode);
        let ctx = ExecutionContext {
            now: candle.timestamp,
            snapshot: &snapshot,
            proposal: &proposal,
            lots,
            open_positions: &open_positions,
            trades_today: day.trades_today,
            last_trade_time: self.last_trade_time.get(&symbol).copied(),
            today_high: Some(day.high),
            today_low: Some(day.low),
            realized_pnl_today: day.realized_pnl_today,
            balance: self.config.scheduler.initial_balance,
            guardrail: mode,
        };
        let decision = ExecutionFilter::evaluate(&ctx, &self.config);
        if !decision.is_trade() {
            return (mode, decision);
        }

        let request = OpenTradeRequest {
            symbol: proposal.symbol,
            side: proposal.side,
            lots,
            entry: match proposal.order_kind {
                OrderKind::Market => None,
                _ => Some(proposal.entry),
            },
            sl: proposal.stop_loss,
            tp: proposal.take_profit,
            order_kind: proposal.order_kind,
        };
        let decision = match broker.open_trade(&request).await {
            Ok(ticket) => {
                info!("[{symbol}] opened ticket {ticket}");
                self.last_trade_time.insert(symbol, candle.timestamp);
                if let Some(d) = self.day_state.get_mut(&symbol) {
                    d.trades_today += 1;
                }
                decision
            }
            Err(BrokerError::NoConnection) => {
                warn!("[{symbol}] broker unreachable, not retrying");
                Decision::skip(vec![ReasonCode::BrokerDown])
            }
            Err(BrokerError::InvalidStopLoss) => Decision::no_signal(ReasonCode::InvalidSl),
            Err(e) => {
                warn!("[{symbol}] broker rejected trade: {e}");
                Decision::skip(vec![ReasonCode::BrokerDown])
            }
        };
        (mode, decision)
    }

    fn size_lots(&self, proposal: &TradeProposal, guardrail: GuardrailMode) -> Decimal {
        let per_lot_risk = proposal.risk_distance() * proposal.symbol.contract_value();
        if per_lot_risk <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let mut risk_amount = self.config.scheduler.initial_balance
            * self.config.risk.risk_per_trade_pct
            / Decimal::ONE_HUNDRED;
        if guardrail == GuardrailMode::Reduced {
            risk_amount /= Decimal::TWO;
        }
        let lots = risk_amount / per_lot_risk;
        let factor = Decimal::from(10u32.pow(proposal.symbol.lot_precision()));
        ((lots * factor).floor() / factor).max(Decimal::new(1, 2))
    }
}

/// Feed that polls a historical source for freshly closed M1 candles. Each
/// poll fetches the recent window per symbol and emits only candles newer
/// than the last one seen, in (timestamp, symbol) order.
pub struct PollingFeed<S: crate::data::HistoricalSource> {
    source: S,
    symbols: Vec<Symbol>,
    poll_seconds: u64,
    last_seen: BTreeMap<Symbol, DateTime<Utc>>,
    queue: std::collections::VecDeque<Candle>,
}

impl<S: crate::data::HistoricalSource> PollingFeed<S> {
    pub fn new(source: S, mut symbols: Vec<Symbol>, poll_seconds: u64) -> Self {
        symbols.sort();
        Self {
            source,
            symbols,
            poll_seconds,
            last_seen: BTreeMap::new(),
            queue: std::collections::VecDeque::new(),
        }
    }

    async fn poll(&mut self) -> anyhow::Result<()> {
        let now = Utc::now();
        let from = now - chrono::Duration::minutes(5);
        let mut fresh: Vec<Candle> = Vec::new();

        for symbol in &self.symbols {
            let candles = self.source.load_candles(*symbol, from, now).await?;
            let seen = self.last_seen.get(symbol).copied();
            for candle in candles {
                if seen.map(|s| candle.timestamp > s).unwrap_or(true) {
                    fresh.push(candle);
                }
            }
        }

        fresh.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.symbol.cmp(&b.symbol)));
        for candle in fresh {
            self.last_seen.insert(candle.symbol, candle.timestamp);
            self.queue.push_back(candle);
        }
        Ok(())
    }
}

#[async_trait]
impl<S: crate::data::HistoricalSource> CandleFeed for PollingFeed<S> {
    async fn next_m1(&mut self) -> anyhow::Result<Option<Candle>> {
        loop {
            if let Some(candle) = self.queue.pop_front() {
                return Ok(Some(candle));
            }
            tokio::time::sleep(std::time::Duration::from_secs(self.poll_seconds)).await;
            if let Err(e) = self.poll().await {
                warn!("candle poll failed, retrying next interval: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::news::StaticGuardrail;
    use crate::types::test_util::candle;
    use crate::types::{Position, Quote, Side};
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct VecFeed {
        candles: std::vec::IntoIter<Candle>,
    }

    #[async_trait]
    impl CandleFeed for VecFeed {
        async fn next_m1(&mut self) -> anyhow::Result<Option<Candle>> {
            Ok(self.candles.next())
        }
    }

    #[derive(Default)]
    struct RecordingBroker {
        opened: AtomicU64,
    }

    #[async_trait]
    impl BrokerAdapter for RecordingBroker {
        async fn open_trade(&self, request: &OpenTradeRequest) -> Result<u64, BrokerError> {
            crate::broker::validate_request(request)?;
            Ok(self.opened.fetch_add(1, Ordering::SeqCst) + 1)
        }

        async fn modify_trade(
            &self,
            _ticket: u64,
            _sl: Option<Decimal>,
            _tp: Option<Decimal>,
        ) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn close_trade(&self, _ticket: u64) -> Result<(), BrokerError> {
            Ok(())
        }

        async fn list_open_positions(&self) -> Result<Vec<Position>, BrokerError> {
            Ok(Vec::new())
        }

        async fn latest_price(&self, symbol: Symbol) -> Result<Quote, BrokerError> {
            Ok(Quote {
                symbol,
                bid: dec!(2000),
                ask: dec!(2000.3),
                timestamp: Utc::now(),
            })
        }
    }

    #[tokio::test]
    async fn live_loop_consumes_the_feed_without_trading_on_no_signal() {
        let mut config = RunConfig::default();
        config.general.symbols = vec![Symbol::XAUUSD];
        let mut engine = LiveEngine::new(config);

        let candles: Vec<Candle> = (0..30)
            .map(|i| candle(i, dec!(2000), dec!(2000.4), dec!(1999.8), dec!(2000.2)))
            .collect();
        let mut feed = VecFeed {
            candles: candles.into_iter(),
        };
        let broker = RecordingBroker::default();
        let guardrail = StaticGuardrail::normal();

        engine
            .run(
                &mut feed,
                &broker,
                &guardrail,
                None,
                &CancelToken::new(),
            )
            .await
            .unwrap();

        // Flat feed, not enough structure for a signal, nothing opened.
        assert_eq!(broker.opened.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn reduced_guardrail_halves_the_risk_sizing() {
        let mut config = RunConfig::default();
        config.general.symbols = vec![Symbol::XAUUSD];
        let engine = LiveEngine::new(config);
        let proposal = TradeProposal {
            symbol: Symbol::XAUUSD,
            side: Side::Buy,
            entry: dec!(2002),
            stop_loss: dec!(1999.5),
            take_profit: dec!(2009.5),
            order_kind: OrderKind::Market,
            confluence_score: 80,
            reason_codes: vec![],
        };
        let normal = engine.size_lots(&proposal, GuardrailMode::Normal);
        let reduced = engine.size_lots(&proposal, GuardrailMode::Reduced);
        assert_eq!(normal, dec!(0.4));
        assert_eq!(reduced, dec!(0.2));
    }
}
