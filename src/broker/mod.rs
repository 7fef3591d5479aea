#![allow(dead_code)]
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::BrokerError;
use crate::types::{OrderKind, Position, Quote, Side, Symbol};

/// Trade request the core hands to a broker. The core never sends a request
/// whose stop is missing or on the wrong side; `validate_request` is the
/// gate in front of every adapter call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenTradeRequest {
    pub symbol: Symbol,
    pub side: Side,
    pub lots: Decimal,
    /// Level for limit/stop orders; `None` for market.
    pub entry: Option<Decimal>,
    pub sl: Decimal,
    pub tp: Decimal,
    pub order_kind: OrderKind,
}

/// Stop mandatory, finite, and strictly on the risk side of the reference
/// price (the entry level for pending orders, the target-implied side for
/// market orders).
pub fn validate_request(request: &OpenTradeRequest) -> Result<(), BrokerError> {
    let reference = request.entry.unwrap_or(request.tp);
    let sided = match request.side {
        Side::Buy => request.sl < reference,
        Side::Sell => request.sl > reference,
    };
    if !sided {
        return Err(BrokerError::InvalidStopLoss);
    }
    if request.lots <= Decimal::ZERO {
        return Err(BrokerError::RejectedByBroker("lots must be > 0".to_string()));
    }
    Ok(())
}

/// Broker collaborator, identical shape live and in replay.
#[async_trait]
pub trait BrokerAdapter: Send + Sync {
    async fn open_trade(&self, request: &OpenTradeRequest) -> Result<u64, BrokerError>;
    async fn modify_trade(
        &self,
        ticket: u64,
        sl: Option<Decimal>,
        tp: Option<Decimal>,
    ) -> Result<(), BrokerError>;
    async fn close_trade(&self, ticket: u64) -> Result<(), BrokerError>;
    async fn list_open_positions(&self) -> Result<Vec<Position>, BrokerError>;
    async fn latest_price(&self, symbol: Symbol) -> Result<Quote, BrokerError>;
}

/// REST adapter against the bridge service sitting in front of the terminal.
#[derive(Debug, Clone)]
pub struct HttpBroker {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TicketResponse {
    ticket: u64,
}

impl HttpBroker {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    fn connection_error(e: reqwest::Error) -> BrokerError {
        if e.is_connect() || e.is_timeout() {
            BrokerError::NoConnection
        } else {
            BrokerError::RejectedByBroker(e.to_string())
        }
    }
}

#[async_trait]
impl BrokerAdapter for HttpBroker {
    async fn open_trade(&self, request: &OpenTradeRequest) -> Result<u64, BrokerError> {
        validate_request(request)?;
        let url = format!("{}/trades", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(Self::connection_error)?;
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BrokerError::RejectedByBroker(body));
        }
        let ticket: TicketResponse = response
            .json()
            .await
            .map_err(|e| BrokerError::RejectedByBroker(e.to_string()))?;
        debug!("[{}] opened ticket {}", request.symbol, ticket.ticket);
        Ok(ticket.ticket)
    }

    async fn modify_trade(
        &self,
        ticket: u64,
        sl: Option<Decimal>,
        tp: Option<Decimal>,
    ) -> Result<(), BrokerError> {
        let url = format!("{}/trades/{ticket}", self.base_url);
        let body = serde_json::json!({ "sl": sl, "tp": tp });
        let response = self
            .client
            .patch(&url)
            .json(&body)
            .send()
            .await
            .map_err(Self::connection_error)?;
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BrokerError::RejectedByBroker(body));
        }
        Ok(())
    }

    async fn close_trade(&self, ticket: u64) -> Result<(), BrokerError> {
        let url = format!("{}/trades/{ticket}", self.base_url);
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(Self::connection_error)?;
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BrokerError::RejectedByBroker(body));
        }
        Ok(())
    }

    async fn list_open_positions(&self) -> Result<Vec<Position>, BrokerError> {
        let url = format!("{}/positions", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::connection_error)?;
        response
            .json()
            .await
            .map_err(|e| BrokerError::RejectedByBroker(e.to_string()))
    }

    async fn latest_price(&self, symbol: Symbol) -> Result<Quote, BrokerError> {
        let url = format!("{}/price/{symbol}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::connection_error)?;
        response
            .json()
            .await
            .map_err(|e| BrokerError::RejectedByBroker(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request(side: Side, sl: Decimal) -> OpenTradeRequest {
        OpenTradeRequest {
            symbol: Symbol::XAUUSD,
            side,
            lots: dec!(0.1),
            entry: Some(dec!(2002)),
            sl,
            tp: dec!(2009.5),
            order_kind: OrderKind::BuyLimit,
        }
    }

    #[test]
    fn wrong_sided_stop_is_rejected_before_submission() {
        let bad = request(Side::Buy, dec!(2005));
        assert!(matches!(
            validate_request(&bad),
            Err(BrokerError::InvalidStopLoss)
        ));

        let good = request(Side::Buy, dec!(1999.5));
        assert!(validate_request(&good).is_ok());
    }

    #[test]
    fn zero_lots_are_rejected() {
        let mut req = request(Side::Buy, dec!(1999.5));
        req.lots = Decimal::ZERO;
        assert!(matches!(
            validate_request(&req),
            Err(BrokerError::RejectedByBroker(_))
        ));
    }
}
