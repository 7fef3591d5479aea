#![allow(dead_code)]
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{Symbol, Timeframe};

/// Typed failures at the ingestion/engine boundary. Analytics shortfalls are
/// deliberately not here; they surface as `Decision::NoSignal` so a replay
/// keeps running.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("out-of-order candle for {symbol} {timeframe}: {incoming} <= last {last}")]
    OutOfOrderCandle {
        symbol: Symbol,
        timeframe: Timeframe,
        incoming: DateTime<Utc>,
        last: DateTime<Utc>,
    },

    #[error("malformed candle for {symbol} {timeframe} at {timestamp}: {detail}")]
    MalformedCandle {
        symbol: Symbol,
        timeframe: Timeframe,
        timestamp: DateTime<Utc>,
        detail: String,
    },

    #[error("invalid timeframe: {0}")]
    InvalidTimeframe(String),

    #[error("bad date range: {from} >= {to}")]
    BadDateRange {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },

    #[error("configuration invalid: {0}")]
    Config(String),

    #[error("data loading failed: {0}")]
    DataLoad(String),

    #[error("replay cancelled at {0}")]
    Cancelled(DateTime<Utc>),

    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

impl EngineError {
    /// Process exit code per the CLI contract.
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::Config(_) | EngineError::InvalidTimeframe(_) => 1,
            EngineError::DataLoad(_)
            | EngineError::BadDateRange { .. }
            | EngineError::OutOfOrderCandle { .. }
            | EngineError::MalformedCandle { .. } => 2,
            EngineError::Cancelled(_) => 3,
            EngineError::Invariant(_) => 4,
        }
    }
}

/// Structured broker-adapter failures, live and simulated alike.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("rejected by broker: {0}")]
    RejectedByBroker(String),

    #[error("stop loss missing or on the wrong side")]
    InvalidStopLoss,

    #[error("no connection to broker")]
    NoConnection,
}
