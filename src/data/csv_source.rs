#![allow(dead_code)]
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

use super::{validate_m1_series, HistoricalSource};
use crate::errors::EngineError;
use crate::types::{Candle, Symbol, Timeframe};

/// File-based backend: one `{SYMBOL}.csv` per symbol with columns
/// `timestamp,open,high,low,close,volume`. Timestamps are RFC 3339 or epoch
/// seconds.
#[derive(Debug, Clone)]
pub struct CsvSource {
    dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
}

impl CsvSource {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, EngineError> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Ok(ts.with_timezone(&Utc));
        }
        raw.parse::<i64>()
            .ok()
            .and_then(|epoch| Utc.timestamp_opt(epoch, 0).single())
            .ok_or_else(|| EngineError::DataLoad(format!("unparseable timestamp '{raw}'")))
    }
}

#[async_trait]
impl HistoricalSource for CsvSource {
    async fn load_candles(
        &self,
        symbol: Symbol,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>, EngineError> {
        let path = self.dir.join(format!("{symbol}.csv"));
        let mut reader = csv::Reader::from_path(&path)
            .map_err(|e| EngineError::DataLoad(format!("{}: {e}", path.display())))?;

        let mut candles = Vec::new();
        for row in reader.deserialize::<CsvRow>() {
            let row = row.map_err(|e| EngineError::DataLoad(format!("{}: {e}", path.display())))?;
            let timestamp = Self::parse_timestamp(&row.timestamp)?;
            if timestamp < from || timestamp >= to {
                continue;
            }
            candles.push(Candle {
                symbol,
                timeframe: Timeframe::M1,
                timestamp,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }

        validate_m1_series(symbol, &candles)?;
        info!("[{symbol}] loaded {} candles from {}", candles.len(), path.display());
        Ok(candles)
    }
}
