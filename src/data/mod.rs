pub mod csv_source;
pub mod http_source;
pub mod sqlite;

pub use csv_source::*;
pub use http_source::*;
pub use sqlite::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::errors::EngineError;
use crate::types::{Candle, Symbol};

/// Pull interface over historical M1 candles. Implementations return the
/// series in strictly ascending timestamp order; `validate_m1_series` is the
/// shared contract check.
#[async_trait]
pub trait HistoricalSource: Send + Sync {
    async fn load_candles(
        &self,
        symbol: Symbol,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>, EngineError>;
}

/// Strictly ascending timestamps are an error to violate; irregular spacing
/// (gaps over weekends, missing minutes) only warns.
pub fn validate_m1_series(symbol: Symbol, candles: &[Candle]) -> Result<(), EngineError> {
    let mut gaps = 0u32;
    for pair in candles.windows(2) {
        let prev = &pair[0];
        let next = &pair[1];
        if next.timestamp <= prev.timestamp {
            return Err(EngineError::OutOfOrderCandle {
                symbol,
                timeframe: prev.timeframe,
                incoming: next.timestamp,
                last: prev.timestamp,
            });
        }
        if (next.timestamp - prev.timestamp).num_seconds() != 60 {
            gaps += 1;
        }
    }
    if gaps > 0 {
        warn!("[{symbol}] {gaps} irregular gaps in M1 series of {} candles", candles.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_util::flat;
    use rust_decimal_macros::dec;

    #[test]
    fn irregular_spacing_is_tolerated() {
        let mut candles = vec![flat(0, dec!(2000)), flat(1, dec!(2000)), flat(5, dec!(2000))];
        assert!(validate_m1_series(Symbol::XAUUSD, &candles).is_ok());

        candles.push(flat(5, dec!(2000)));
        assert!(matches!(
            validate_m1_series(Symbol::XAUUSD, &candles),
            Err(EngineError::OutOfOrderCandle { .. })
        ));
    }
}
