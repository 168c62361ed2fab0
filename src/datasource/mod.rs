//! Trade-history feed abstraction.

use crate::domain::{AccountLogin, ClosedTrade, TimeS};
use async_trait::async_trait;
use std::fmt;

pub mod mock;
pub mod mt5;

pub use mock::MockTradeFeed;
pub use mt5::Mt5TradeFeed;

/// Read-only feed of closed trades for a trading account.
///
/// The feed is idempotent on re-fetch: the same ticket may reappear across
/// overlapping lookback windows. Callers deduplicate via the ledger's
/// (ticket, broker) key, never by trusting the feed.
#[async_trait]
pub trait TradeFeed: Send + Sync + fmt::Debug {
    /// Fetch trades closed within `[from, to]` for one account login.
    async fn fetch_closed_trades(
        &self,
        login: AccountLogin,
        from: TimeS,
        to: TimeS,
    ) -> Result<Vec<ClosedTrade>, FeedError>;
}

/// Error type for trade feed operations.
#[derive(Debug, Clone)]
pub enum FeedError {
    /// Network error (connection refused, DNS failure, timeout).
    NetworkError(String),
    /// HTTP error (429 rate limit, 5xx server error).
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed response).
    ParseError(String),
    /// Rate limit exceeded.
    RateLimited,
    /// Other error.
    Other(String),
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            FeedError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            FeedError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            FeedError::RateLimited => write!(f, "Rate limited"),
            FeedError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for FeedError {}
