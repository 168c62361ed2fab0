//! MT5 bridge API client for closed-trade history.

use super::{FeedError, TradeFeed};
use crate::domain::{AccountLogin, ClosedTrade, Decimal, Ticket, TimeS};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Trade feed backed by the MT5 manager bridge HTTP API.
#[derive(Debug, Clone)]
pub struct Mt5TradeFeed {
    client: Client,
    base_url: String,
}

impl Mt5TradeFeed {
    /// Create a feed client. `timeout` bounds every request so a hung
    /// bridge skips one account's fetch instead of stalling the batch.
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::Other(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    async fn get_history(
        &self,
        login: AccountLogin,
        from: TimeS,
        to: TimeS,
    ) -> Result<serde_json::Value, FeedError> {
        let url = format!("{}/history/deals", self.base_url);
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .get(&url)
                .query(&[
                    ("login", login.as_i64().to_string()),
                    ("from", from.as_i64().to_string()),
                    ("to", to.as_i64().to_string()),
                ])
                .send()
                .await
                .map_err(|e| backoff::Error::transient(FeedError::NetworkError(e.to_string())))?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(FeedError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(FeedError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(FeedError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(FeedError::ParseError(e.to_string())))
        })
        .await
    }
}

#[async_trait]
impl TradeFeed for Mt5TradeFeed {
    async fn fetch_closed_trades(
        &self,
        login: AccountLogin,
        from: TimeS,
        to: TimeS,
    ) -> Result<Vec<ClosedTrade>, FeedError> {
        debug!(
            "Fetching closed trades for login={}, from={}, to={}",
            login,
            from.as_i64(),
            to.as_i64()
        );

        let response = self.get_history(login, from, to).await?;

        let trades_json = response
            .as_array()
            .ok_or_else(|| FeedError::ParseError("Expected array response".to_string()))?;

        let mut trades = Vec::new();
        for trade_json in trades_json {
            match parse_trade(trade_json, login) {
                Ok(trade) => trades.push(trade),
                Err(e) => {
                    warn!("Failed to parse closed trade: {}", e);
                }
            }
        }

        Ok(trades)
    }
}

fn parse_trade(trade_json: &serde_json::Value, login: AccountLogin) -> Result<ClosedTrade, FeedError> {
    let ticket = trade_json
        .get("ticket")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| FeedError::ParseError("Missing ticket field".to_string()))?;

    let symbol = trade_json
        .get("symbol")
        .and_then(|v| v.as_str())
        .ok_or_else(|| FeedError::ParseError("Missing symbol field".to_string()))?
        .to_string();

    let lots_str = trade_json
        .get("volume")
        .and_then(|v| v.as_str())
        .ok_or_else(|| FeedError::ParseError("Missing volume field".to_string()))?;
    let lots = Decimal::from_str_canonical(lots_str)
        .map_err(|e| FeedError::ParseError(format!("Invalid volume: {}", e)))?;

    let profit_str = trade_json
        .get("profit")
        .and_then(|v| v.as_str())
        .ok_or_else(|| FeedError::ParseError("Missing profit field".to_string()))?;
    let profit = Decimal::from_str_canonical(profit_str)
        .map_err(|e| FeedError::ParseError(format!("Invalid profit: {}", e)))?;

    let open_time = trade_json
        .get("open_time")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| FeedError::ParseError("Missing open_time field".to_string()))?;

    let close_time = trade_json
        .get("close_time")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| FeedError::ParseError("Missing close_time field".to_string()))?;

    Ok(ClosedTrade {
        ticket: Ticket::new(ticket),
        login,
        symbol,
        lots,
        profit,
        open_time: TimeS::new(open_time),
        close_time: TimeS::new(close_time),
    })
}
