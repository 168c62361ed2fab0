//! Repository layer: the referral/broker store and the commission ledger.

mod brokers;
mod ledger;

pub use brokers::TradingAccount;

use sqlx::sqlite::SqlitePool;

/// Repository over the CRM database.
///
/// Split across two concerns: `brokers` (read/write broker-and-referral
/// store) and `ledger` (the atomic ledger writer plus read-side helpers).
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }
}
