//! Mock trade feed for testing without network calls.

use super::{FeedError, TradeFeed};
use crate::domain::{AccountLogin, ClosedTrade, TimeS};
use async_trait::async_trait;
use std::collections::HashSet;

/// Mock feed returning predefined trades, with per-login failure injection.
#[derive(Debug, Clone, Default)]
pub struct MockTradeFeed {
    trades: Vec<ClosedTrade>,
    failing_logins: HashSet<AccountLogin>,
}

impl MockTradeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a trade to the feed.
    pub fn with_trade(mut self, trade: ClosedTrade) -> Self {
        self.trades.push(trade);
        self
    }

    /// Add multiple trades to the feed.
    pub fn with_trades(mut self, trades: Vec<ClosedTrade>) -> Self {
        self.trades.extend(trades);
        self
    }

    /// Make fetches for one login fail with a network error.
    pub fn with_failing_login(mut self, login: AccountLogin) -> Self {
        self.failing_logins.insert(login);
        self
    }
}

#[async_trait]
impl TradeFeed for MockTradeFeed {
    async fn fetch_closed_trades(
        &self,
        login: AccountLogin,
        from: TimeS,
        to: TimeS,
    ) -> Result<Vec<ClosedTrade>, FeedError> {
        if self.failing_logins.contains(&login) {
            return Err(FeedError::NetworkError("injected failure".to_string()));
        }

        Ok(self
            .trades
            .iter()
            .filter(|t| t.login == login && t.close_time >= from && t.close_time <= to)
            .cloned()
            .collect())
    }
}
