#![allow(dead_code)]
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::info;

use super::{validate_m1_series, HistoricalSource};
use crate::errors::EngineError;
use crate::types::{Candle, Symbol, Timeframe};

/// Relational backend over `historical_candles`, unique on
/// (symbol, timeframe, timestamp). Timestamps are stored as RFC 3339 text.
pub struct SqliteSource {
    pool: SqlitePool,
}

impl SqliteSource {
    pub async fn new(db_path: &str) -> Result<Self, EngineError> {
        info!("opening candle store at {db_path}");
        let options = SqliteConnectOptions::from_str(db_path)
            .map_err(|e| EngineError::DataLoad(e.to_string()))?
            .create_if_missing(true);
        // One connection: sqlite writes serialize anyway, and an in-memory
        // database is per-connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| EngineError::DataLoad(e.to_string()))?;

        let source = Self { pool };
        source.create_schema().await?;
        Ok(source)
    }

    async fn create_schema(&self) -> Result<(), EngineError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS historical_candles (
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                open TEXT NOT NULL,
                high TEXT NOT NULL,
                low TEXT NOT NULL,
                close TEXT NOT NULL,
                volume TEXT NOT NULL,
                UNIQUE(symbol, timeframe, timestamp)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| EngineError::DataLoad(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_candles_lookup
            ON historical_candles(symbol, timeframe, timestamp)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| EngineError::DataLoad(e.to_string()))?;

        Ok(())
    }

    /// Ingest candles, ignoring duplicates on the unique key.
    pub async fn store_candles(&self, candles: &[Candle]) -> Result<u64, EngineError> {
        let mut stored = 0u64;
        for c in candles {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO historical_candles
                    (symbol, timeframe, timestamp, open, high, low, close, volume)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(c.symbol.as_str())
            .bind(c.timeframe.as_str())
            .bind(c.timestamp.to_rfc3339())
            .bind(c.open.to_string())
            .bind(c.high.to_string())
            .bind(c.low.to_string())
            .bind(c.close.to_string())
            .bind(c.volume.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| EngineError::DataLoad(e.to_string()))?;
            stored += result.rows_affected();
        }
        Ok(stored)
    }
}

fn column_decimal(row: &sqlx::sqlite::SqliteRow, name: &str) -> Result<Decimal, EngineError> {
    let raw: String = row
        .try_get(name)
        .map_err(|e| EngineError::DataLoad(e.to_string()))?;
    raw.parse()
        .map_err(|e| EngineError::DataLoad(format!("bad decimal in column {name}: {e}")))
}

#[async_trait]
impl HistoricalSource for SqliteSource {
    async fn load_candles(
        &self,
        symbol: Symbol,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>, EngineError> {
        let rows = sqlx::query(
            r#"
            SELECT timestamp, open, high, low, close, volume
            FROM historical_candles
            WHERE symbol = ? AND timeframe = 'M1' AND timestamp >= ? AND timestamp < ?
            ORDER BY timestamp ASC
            "#,
        )
        .bind(symbol.as_str())
        .bind(from.to_rfc3339())
        .bind(to.to_rfc3339())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EngineError::DataLoad(e.to_string()))?;

        let mut candles = Vec::with_capacity(rows.len());
        for row in &rows {
            let raw_ts: String = row
                .try_get("timestamp")
                .map_err(|e| EngineError::DataLoad(e.to_string()))?;
            let timestamp = DateTime::parse_from_rfc3339(&raw_ts)
                .map_err(|e| EngineError::DataLoad(format!("bad timestamp '{raw_ts}': {e}")))?
                .with_timezone(&Utc);
            candles.push(Candle {
                symbol,
                timeframe: Timeframe::M1,
                timestamp,
                open: column_decimal(row, "open")?,
                high: column_decimal(row, "high")?,
                low: column_decimal(row, "low")?,
                close: column_decimal(row, "close")?,
                volume: column_decimal(row, "volume")?,
            });
        }

        validate_m1_series(symbol, &candles)?;
        info!("[{symbol}] loaded {} candles from sqlite", candles.len());
        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_util::{candle, minute};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn store_and_load_round_trip() {
        let source = SqliteSource::new("sqlite::memory:").await.unwrap();
        let candles = vec![
            candle(0, dec!(2000), dec!(2001), dec!(1999), dec!(2000.5)),
            candle(1, dec!(2000.5), dec!(2002), dec!(2000), dec!(2001.5)),
        ];
        let stored = source.store_candles(&candles).await.unwrap();
        assert_eq!(stored, 2);

        // Duplicates are ignored, not errors.
        let again = source.store_candles(&candles).await.unwrap();
        assert_eq!(again, 0);

        let loaded = source
            .load_candles(Symbol::XAUUSD, minute(0), minute(10))
            .await
            .unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], candles[0]);
        assert_eq!(loaded[1], candles[1]);
    }

    #[tokio::test]
    async fn range_filter_is_half_open() {
        let source = SqliteSource::new("sqlite::memory:").await.unwrap();
        let candles = vec![
            candle(0, dec!(2000), dec!(2001), dec!(1999), dec!(2000.5)),
            candle(1, dec!(2000.5), dec!(2002), dec!(2000), dec!(2001.5)),
            candle(2, dec!(2001.5), dec!(2003), dec!(2001), dec!(2002.5)),
        ];
        source.store_candles(&candles).await.unwrap();

        let loaded = source
            .load_candles(Symbol::XAUUSD, minute(1), minute(2))
            .await
            .unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].timestamp, minute(1));
    }
}
