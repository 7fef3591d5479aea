pub mod candle;
pub mod decision;
pub mod position;
pub mod structure;
pub mod trading;
pub mod zones;

pub use candle::*;
pub use decision::*;
pub use position::*;
pub use structure::*;
pub use trading::*;
pub use zones::*;

#[cfg(test)]
pub mod test_util {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal::Decimal;

    pub fn minute(i: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap() + chrono::Duration::minutes(i)
    }

    /// M1 XAUUSD candle at minute `i` with unit volume.
    pub fn candle(i: i64, open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        Candle {
            symbol: Symbol::XAUUSD,
            timeframe: Timeframe::M1,
            timestamp: minute(i),
            open,
            high,
            low,
            close,
            volume: Decimal::ONE,
        }
    }

    pub fn candle_tf(
        tf: Timeframe,
        i: i64,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
    ) -> Candle {
        Candle {
            symbol: Symbol::XAUUSD,
            timeframe: tf,
            timestamp: minute(i * tf.minutes()),
            open,
            high,
            low,
            close,
            volume: Decimal::ONE,
        }
    }

    /// Flat candle at `price`, used to pad sequences.
    pub fn flat(i: i64, price: Decimal) -> Candle {
        candle(i, price, price, price, price)
    }
}
