#![allow(dead_code)]
use std::collections::BTreeMap;

use crate::errors::EngineError;
use crate::types::{Candle, Symbol, Timeframe};

pub const DEFAULT_BUFFER_CAPACITY: usize = 1000;

/// Bounded ordered buffer of closed candles for one (symbol, timeframe).
#[derive(Debug, Clone)]
pub struct CandleBuffer {
    candles: Vec<Candle>,
    capacity: usize,
}

impl CandleBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            candles: Vec::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    fn push(&mut self, candle: Candle) {
        if self.candles.len() >= self.capacity {
            self.candles.remove(0);
        }
        self.candles.push(candle);
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Last `n` candles, oldest first.
    pub fn last_n(&self, n: usize) -> &[Candle] {
        let len = self.candles.len();
        if n >= len {
            &self.candles[..]
        } else {
            &self.candles[len - n..]
        }
    }

    pub fn as_slice(&self) -> &[Candle] {
        &self.candles
    }
}

/// Exclusive owner of all candle buffers (C1). Writers are the aggregator
/// (higher timeframes) and the ingestion path (M1); analytics only read.
/// Keyed by a BTreeMap so iteration order never depends on insertion.
#[derive(Debug)]
pub struct CandleStore {
    buffers: BTreeMap<(Symbol, Timeframe), CandleBuffer>,
    capacity: usize,
}

impl CandleStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: BTreeMap::new(),
            capacity,
        }
    }

    /// Append a closed candle. Fails with `OutOfOrderCandle` when the
    /// timestamp does not strictly advance, and `MalformedCandle` when the
    /// OHLC invariant does not hold. Both are fatal for live ingestion.
    pub fn append(&mut self, candle: Candle) -> Result<(), EngineError> {
        if !candle.is_well_formed() {
            return Err(EngineError::MalformedCandle {
                symbol: candle.symbol,
                timeframe: candle.timeframe,
                timestamp: candle.timestamp,
                detail: "OHLC ordering or negative volume".to_string(),
            });
        }

        let key = (candle.symbol, candle.timeframe);
        let buffer = self
            .buffers
            .entry(key)
            .or_insert_with(|| CandleBuffer::new(self.capacity));

        if let Some(last) = buffer.last() {
            if candle.timestamp <= last.timestamp {
                return Err(EngineError::OutOfOrderCandle {
                    symbol: candle.symbol,
                    timeframe: candle.timeframe,
                    incoming: candle.timestamp,
                    last: last.timestamp,
                });
            }
        }

        buffer.push(candle);
        Ok(())
    }

    /// Last `n` candles for (symbol, timeframe), oldest first. Empty slice
    /// when nothing has been stored yet.
    pub fn latest(&self, symbol: Symbol, timeframe: Timeframe, n: usize) -> &[Candle] {
        self.buffers
            .get(&(symbol, timeframe))
            .map(|b| b.last_n(n))
            .unwrap_or(&[])
    }

    pub fn latest_one(&self, symbol: Symbol, timeframe: Timeframe) -> Option<&Candle> {
        self.buffers.get(&(symbol, timeframe)).and_then(|b| b.last())
    }

    pub fn len(&self, symbol: Symbol, timeframe: Timeframe) -> usize {
        self.buffers
            .get(&(symbol, timeframe))
            .map(|b| b.len())
            .unwrap_or(0)
    }

    /// Drop buffers for one symbol, or everything when `symbol` is `None`.
    pub fn clear(&mut self, symbol: Option<Symbol>) {
        match symbol {
            Some(s) => self.buffers.retain(|(sym, _), _| *sym != s),
            None => self.buffers.clear(),
        }
    }
}

impl Default for CandleStore {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}
