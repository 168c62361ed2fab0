//! Ledger writer: idempotent entry insertion with atomic balance credit.

use super::Repository;
use crate::domain::{
    BrokerId, ClientId, Decimal, EntryStatus, GroupId, LedgerEntry, Ticket, TimeS,
};
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;

impl Repository {
    /// Post one participant's ledger entry and credit its balance, both in
    /// one transaction.
    ///
    /// Returns false when an entry for (ticket, broker) already exists; in
    /// that case nothing is written and no balance moves, which makes the
    /// batch sync safe to re-run or retry after partial failure.
    ///
    /// # Errors
    /// Returns an error if the transaction fails; the entry and the credit
    /// then roll back together.
    pub async fn post_entry(&self, entry: &LedgerEntry) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO commission_ledger (
                ticket, broker_id, client_id, symbol, group_id, lots, profit,
                rate, pip_value, amount, open_time, close_time, duration_secs,
                status, exclusion_reason, chain_level, is_override, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(ticket, broker_id) DO NOTHING
            "#,
        )
        .bind(entry.ticket.as_i64())
        .bind(entry.broker_id.as_i64())
        .bind(entry.client_id.as_i64())
        .bind(entry.symbol.as_str())
        .bind(entry.group.as_str())
        .bind(entry.lots.to_canonical_string())
        .bind(entry.profit.to_canonical_string())
        .bind(entry.rate.to_canonical_string())
        .bind(entry.pip_value.to_canonical_string())
        .bind(entry.amount.to_canonical_string())
        .bind(entry.open_time.as_i64())
        .bind(entry.close_time.as_i64())
        .bind(entry.duration_secs)
        .bind(entry.status.as_str())
        .bind(entry.exclusion_reason.map(|r| r.as_str()))
        .bind(entry.chain_level)
        .bind(entry.is_override as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        if entry.amount.is_positive() {
            // Read-modify-write inside the write transaction; SQLite's
            // single-writer semantics make this the row lock.
            let row = sqlx::query("SELECT balance FROM brokers WHERE user_id = ?")
                .bind(entry.broker_id.as_i64())
                .fetch_optional(&mut *tx)
                .await?;

            match row {
                Some(row) => {
                    let balance_str: String = row.get("balance");
                    let balance = Decimal::from_str(&balance_str).unwrap_or_default();
                    sqlx::query("UPDATE brokers SET balance = ? WHERE user_id = ?")
                        .bind((balance + entry.amount).to_canonical_string())
                        .bind(entry.broker_id.as_i64())
                        .execute(&mut *tx)
                        .await?;
                }
                None => {
                    // Ledger rows for a vanished broker record stand as
                    // audit; there is no balance row to credit.
                    warn!(
                        "no broker record for {} while crediting {}, entry kept without credit",
                        entry.broker_id, entry.amount
                    );
                }
            }
        }

        tx.commit().await?;
        Ok(true)
    }

    /// All ledger entries for one trade ticket, deepest chain level first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn entries_for_ticket(&self, ticket: Ticket) -> Result<Vec<LedgerEntry>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT ticket, broker_id, client_id, symbol, group_id, lots, profit,
                   rate, pip_value, amount, open_time, close_time, duration_secs,
                   status, exclusion_reason, chain_level, is_override
            FROM commission_ledger
            WHERE ticket = ?
            ORDER BY chain_level DESC, broker_id ASC
            "#,
        )
        .bind(ticket.as_i64())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_entry).collect())
    }

    /// A broker's current spendable balance.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn broker_balance(&self, broker: BrokerId) -> Result<Decimal, sqlx::Error> {
        let row = sqlx::query("SELECT balance FROM brokers WHERE user_id = ?")
            .bind(broker.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row
            .map(|r| {
                let balance_str: String = r.get("balance");
                Decimal::from_str(&balance_str).unwrap_or_default()
            })
            .unwrap_or_else(Decimal::zero))
    }
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> LedgerEntry {
    let lots_str: String = row.get("lots");
    let profit_str: String = row.get("profit");
    let rate_str: String = row.get("rate");
    let pip_value_str: String = row.get("pip_value");
    let amount_str: String = row.get("amount");
    let status_str: String = row.get("status");
    let reason: Option<String> = row.get("exclusion_reason");
    let is_override: i64 = row.get("is_override");

    LedgerEntry {
        ticket: Ticket::new(row.get("ticket")),
        broker_id: BrokerId::new(row.get("broker_id")),
        client_id: ClientId::new(row.get("client_id")),
        symbol: row.get("symbol"),
        group: GroupId::new(row.get("group_id")),
        lots: Decimal::from_str(&lots_str).unwrap_or_default(),
        profit: Decimal::from_str(&profit_str).unwrap_or_default(),
        rate: Decimal::from_str(&rate_str).unwrap_or_default(),
        pip_value: Decimal::from_str(&pip_value_str).unwrap_or_default(),
        amount: Decimal::from_str(&amount_str).unwrap_or_default(),
        open_time: TimeS::new(row.get("open_time")),
        close_time: TimeS::new(row.get("close_time")),
        duration_secs: row.get("duration_secs"),
        status: EntryStatus::from_str_db(&status_str).unwrap_or(EntryStatus::Excluded),
        exclusion_reason: reason.and_then(|r| match r.as_str() {
            "self-trade" => Some(crate::domain::ExclusionReason::SelfTrade),
            "trade duration <= 60 seconds" => Some(crate::domain::ExclusionReason::ShortDuration),
            _ => None,
        }),
        chain_level: row.get("chain_level"),
        is_override: is_override != 0,
    }
}
