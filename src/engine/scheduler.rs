#![allow(dead_code)]
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::broker_sim::SimBroker;
use super::results::{DecisionRecord, EquityPoint, ReplayReport, RunCounters};
use crate::analytics::ContextBuilder;
use crate::config::RunConfig;
use crate::errors::{BrokerError, EngineError};
use crate::execution::{ExecutionContext, ExecutionFilter};
use crate::news::GuardrailMode;
use crate::strategies::StrategyKind;
use crate::types::{Candle, Decision, ReasonCode, Symbol, Timeframe, TradeProposal};
use crate::market::{CandleAggregator, CandleStore};

/// Cooperative cancellation handle. Checked once per tick boundary; a tick
/// is never half-applied. `after_ticks` arms a deterministic budget, used
/// for bounded replays and for exercising the cancellation contract.
#[derive(Debug, Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    budget: Arc<AtomicI64>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            budget: Arc::new(AtomicI64::new(-1)),
        }
    }

    pub fn after_ticks(n: u64) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            budget: Arc::new(AtomicI64::new(n as i64)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Called by the scheduler before each tick. Returns true when the run
    /// should stop at this boundary.
    fn checkpoint(&self) -> bool {
        if self.flag.load(Ordering::SeqCst) {
            return true;
        }
        let budget = self.budget.load(Ordering::SeqCst);
        if budget < 0 {
            return false;
        }
        if budget == 0 {
            self.flag.store(true, Ordering::SeqCst);
            return true;
        }
        self.budget.store(budget - 1, Ordering::SeqCst);
        false
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
struct DayState {
    date: NaiveDate,
    high: Decimal,
    low: Decimal,
    trades_today: u32,
    realized_pnl_today: Decimal,
}

/// Candle-replay scheduler (C10). Single-threaded by contract: one merged
/// candle stream drives store, aggregator, broker, analytics and strategy in
/// a fixed order, so identical inputs yield byte-identical outputs.
pub struct ReplayEngine {
    config: RunConfig,
    strategy: StrategyKind,
    guardrail: GuardrailMode,
    store: CandleStore,
    aggregator: CandleAggregator,
    broker: SimBroker,
    builders: BTreeMap<Symbol, ContextBuilder>,
    day_state: BTreeMap<Symbol, DayState>,
    last_trade_time: BTreeMap<Symbol, DateTime<Utc>>,
    marks: BTreeMap<Symbol, Decimal>,
    counters: RunCounters,
}

impl ReplayEngine {
    pub fn new(config: RunConfig) -> Self {
        Self::with_guardrail(config, GuardrailMode::Normal)
    }

    /// Replay with a fixed guardrail verdict, e.g. `Blocked` to model a news
    /// lockout across the whole range.
    pub fn with_guardrail(config: RunConfig, guardrail: GuardrailMode) -> Self {
        let strategy = StrategyKind::from_config(&config);
        let broker = SimBroker::new(config.scheduler.clone());
        let builders = config
            .general
            .symbols
            .iter()
            .map(|s| (*s, config.context_builder(*s)))
            .collect();
        Self {
            config,
            strategy,
            guardrail,
            store: CandleStore::default(),
            aggregator: CandleAggregator::new(),
            broker,
            builders,
            day_state: BTreeMap::new(),
            last_trade_time: BTreeMap::new(),
            marks: BTreeMap::new(),
            counters: RunCounters::default(),
        }
    }

    /// Full state reset. Nothing survives across runs.
    fn reset(&mut self) {
        self.store.clear(None);
        self.aggregator.reset();
        self.broker.reset();
        self.day_state.clear();
        self.last_trade_time.clear();
        self.marks.clear();
        self.counters = RunCounters::default();
    }

    /// Run the replay over per-symbol M1 candle series. Candles are merged
    /// into a single sequence ordered by (timestamp, symbol) and processed
    /// strictly in that order.
    pub fn run(
        &mut self,
        data: BTreeMap<Symbol, Vec<Candle>>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> Result<ReplayReport, EngineError> {
        if from >= to {
            return Err(EngineError::BadDateRange { from, to });
        }
        self.reset();

        let mut timeline: Vec<Candle> = Vec::new();
        for (symbol, candles) in data {
            for c in &candles {
                if c.timeframe != Timeframe::M1 {
                    return Err(EngineError::InvalidTimeframe(format!(
                        "{symbol} replay input must be M1, got {}",
                        c.timeframe
                    )));
                }
            }
            timeline.extend(candles);
        }
        timeline.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        info!("replay: {} candles in timeline", timeline.len());

        let mut decisions: Vec<DecisionRecord> = Vec::new();
        let mut equity: Vec<EquityPoint> = Vec::new();
        let mut cancelled = false;
        let mut closed_seen = 0usize;

        for candle in &timeline {
            if cancel.checkpoint() {
                warn!("replay cancelled at {}", candle.timestamp);
                cancelled = true;
                break;
            }

            self.tick(candle, &mut decisions, &mut equity, &mut closed_seen)?;
        }

        if !cancelled {
            let end = timeline.last().map(|c| c.timestamp).unwrap_or(to);
            self.broker.close_all(&self.marks, end);
        }

        Ok(ReplayReport::build(
            from,
            to,
            self.config.scheduler.initial_balance,
            self.broker.balance(),
            self.broker.closed_positions().to_vec(),
            equity,
            decisions,
            self.counters,
            cancelled,
        ))
    }

    /// One tick: aggregate, store, advance the broker, evaluate, record.
    fn tick(
        &mut self,
        candle: &Candle,
        decisions: &mut Vec<DecisionRecord>,
        equity: &mut Vec<EquityPoint>,
        closed_seen: &mut usize,
    ) -> Result<(), EngineError> {
        let symbol = candle.symbol;
        self.counters.ticks += 1;

        // 1. Higher-timeframe buckets close before the M1 candle that opened
        //    the new bucket becomes visible.
        for closed in self.aggregator.roll(candle) {
            self.store.append(closed)?;
        }
        self.store.append(candle.clone())?;

        // 2. Broker sees the candle: pending fills, then intrabar stops.
        self.broker.on_candle(candle);
        self.settle_closures(closed_seen);

        // 3. Daily rollover and extremes.
        let date = candle.timestamp.date_naive();
        let day = self
            .day_state
            .entry(symbol)
            .and_modify(|d| {
                if d.date != date {
                    *d = DayState {
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
            .or_insert_with(|| DayState {
                date,
                high: candle.high,
                low: candle.low,
                trades_today: 0,
                realized_pnl_today: Decimal::ZERO,
            })
            .clone();

        self.marks.insert(symbol, candle.close);

        // 4. Evaluate the pipeline. A blocked guardrail pre-empts the
        //    strategy entirely: the tick skips no matter how good the setup.
        let decision = if self.guardrail == GuardrailMode::Blocked {
            Decision::skip(vec![ReasonCode::GuardrailBlocked])
        } else {
            let half_spread = self.config.scheduler.spread_for(symbol) / Decimal::TWO;
            let bid = candle.close - half_spread;
            let ask = candle.close + half_spread;
            let builder = self
                .builders
                .get(&symbol)
                .ok_or_else(|| EngineError::Invariant(format!("no context builder for {symbol}")))?;
            let snapshot = builder.build(&self.store, symbol, candle.timestamp, bid, ask);
            if snapshot.htf.bias.polarity().is_some() && snapshot.htf.anchor.is_none() {
                self.counters.bias_anchor_missing += 1;
            }

            match self.strategy.evaluate(&snapshot, &self.config) {
                Decision::Trade { proposal } => {
                    self.counters.proposals += 1;
                    self.execute(proposal, &snapshot, &day, candle.timestamp)
                }
                other => other,
            }
        };

        self.observe(&decision);
        decisions.push(DecisionRecord::new(
            candle.timestamp,
            symbol,
            self.strategy.name(),
            self.guardrail,
            decision,
        ));

        // 5. Equity sample at candle close.
        equity.push(EquityPoint {
            timestamp: candle.timestamp,
            symbol,
            equity: self.broker.equity(&self.marks),
            balance: self.broker.balance(),
        });

        Ok(())
    }

    /// Size, filter, and submit a proposal; the outcome becomes the tick's
    /// decision.
    fn execute(
        &mut self,
        proposal: TradeProposal,
        snapshot: &crate::analytics::MarketSnapshot,
        day: &DayState,
        now: DateTime<Utc>,
    ) -> Decision {
        let lots = self.size_lots(&proposal);
        if lots <= Decimal::ZERO {
            return Decision::no_signal(ReasonCode::RiskTooLarge {
                distance: proposal.risk_distance(),
                cap: self.broker.balance(),
            });
        }

        let ctx = ExecutionContext {
            now,
            snapshot,
            proposal: &proposal,
            lots,
            open_positions: self.broker.open_positions(),
            trades_today: day.trades_today,
            last_trade_time: self.last_trade_time.get(&proposal.symbol).copied(),
            today_high: Some(day.high),
            today_low: Some(day.low),
            realized_pnl_today: day.realized_pnl_today,
            balance: self.broker.balance(),
            guardrail: self.guardrail,
        };
        let decision = ExecutionFilter::evaluate(&ctx, &self.config);
        if !decision.is_trade() {
            return decision;
        }

        match self.broker.submit(&proposal, lots, now) {
            Ok(ticket) => {
                debug!("[{}] submitted ticket {}", proposal.symbol, ticket);
                self.counters.submissions += 1;
                self.last_trade_time.insert(proposal.symbol, now);
                if let Some(d) = self.day_state.get_mut(&proposal.symbol) {
                    d.trades_today += 1;
                }
                decision
            }
            Err(BrokerError::InvalidStopLoss) => Decision::no_signal(ReasonCode::InvalidSl),
            Err(e) => {
                warn!("[{}] broker rejected submission: {e}", proposal.symbol);
                Decision::skip(vec![ReasonCode::BrokerDown])
            }
        }
    }

    /// Risk-based sizing (contract level): lots such that the stop distance
    /// costs `risk_per_trade_pct` of balance. A reduced guardrail halves it.
    fn size_lots(&self, proposal: &TradeProposal) -> Decimal {
        let per_lot_risk = proposal.risk_distance() * proposal.symbol.contract_value();
        if per_lot_risk <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let mut risk_amount =
            self.broker.balance() * self.config.risk.risk_per_trade_pct / Decimal::ONE_HUNDRED;
        if self.guardrail == GuardrailMode::Reduced {
            risk_amount /= Decimal::TWO;
        }
        let lots = risk_amount / per_lot_risk;
        let factor = Decimal::from(10u32.pow(proposal.symbol.lot_precision()));
        let rounded = (lots * factor).floor() / factor;
        rounded.max(Decimal::new(1, 2))
    }

    /// Fold newly closed positions into the daily PnL ledger.
    fn settle_closures(&mut self, closed_seen: &mut usize) {
        let closed = self.broker.closed_positions();
        for position in &closed[*closed_seen..] {
            if let (Some(pnl), Some(at)) = (position.pnl, position.closed_at) {
                if let Some(day) = self.day_state.get_mut(&position.symbol) {
                    if day.date == at.date_naive() {
                        day.realized_pnl_today += pnl;
                    }
                }
            }
        }
        *closed_seen = closed.len();
    }

    fn observe(&mut self, decision: &Decision) {
        match decision {
            Decision::Trade { .. } => {}
            Decision::Skip { .. } => self.counters.skips += 1,
            Decision::NoSignal { reason } => {
                self.counters.no_signal += 1;
                match reason {
                    ReasonCode::BiasAnchorMissing => self.counters.bias_anchor_missing += 1,
                    ReasonCode::SwingUnderflow => self.counters.swing_underflow += 1,
                    ReasonCode::BufferEmpty => self.counters.buffer_empty += 1,
                    _ => {}
                }
            }
        }
    }
}
