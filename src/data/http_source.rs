#![allow(dead_code)]
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use super::{validate_m1_series, HistoricalSource};
use crate::errors::EngineError;
use crate::types::{Candle, Symbol, Timeframe};

/// Broker-adapter pull backend:
/// `GET {base}/candles?symbol=..&from=..&to=..&timeframe=M1`.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct CandleDto {
    timestamp: DateTime<Utc>,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
}

impl HttpSource {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl HistoricalSource for HttpSource {
    async fn load_candles(
        &self,
        symbol: Symbol,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>, EngineError> {
        let url = format!("{}/candles", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol.as_str().to_string()),
                ("from", from.to_rfc3339()),
                ("to", to.to_rfc3339()),
                ("timeframe", "M1".to_string()),
            ])
            .send()
            .await
            .map_err(|e| EngineError::DataLoad(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EngineError::DataLoad(format!(
                "candle pull for {symbol} failed with status {}",
                response.status()
            )));
        }

        let rows: Vec<CandleDto> = response
            .json()
            .await
            .map_err(|e| EngineError::DataLoad(e.to_string()))?;
        let candles: Vec<Candle> = rows
            .into_iter()
            .map(|dto| Candle {
                symbol,
                timeframe: Timeframe::M1,
                timestamp: dto.timestamp,
                open: dto.open,
                high: dto.high,
                low: dto.low,
                close: dto.close,
                volume: dto.volume,
            })
            .collect();

        validate_m1_series(symbol, &candles)?;
        info!("[{symbol}] pulled {} candles from {url}", candles.len());
        Ok(candles)
    }
}
