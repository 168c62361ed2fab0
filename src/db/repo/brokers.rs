//! Referral/broker store queries.

use super::Repository;
use crate::domain::{
    AccountLogin, Broker, BrokerId, ClientId, Decimal, GroupId, RateTable, ReferralCode,
};
use crate::engine::{ReferralLookup, ReferredUser};
use async_trait::async_trait;
use sqlx::Row;
use std::collections::HashMap;
use std::str::FromStr;

/// A client's live trading account on the external platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradingAccount {
    pub login: AccountLogin,
    pub group: GroupId,
}

impl Repository {
    /// Load every approved (active) broker with its rate table.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn approved_brokers(&self) -> Result<Vec<Broker>, sqlx::Error> {
        let rate_rows = sqlx::query("SELECT broker_id, group_id, rate FROM broker_rates")
            .fetch_all(&self.pool)
            .await?;

        let mut rates: HashMap<i64, RateTable> = HashMap::new();
        for row in &rate_rows {
            let broker_id: i64 = row.get("broker_id");
            let group: String = row.get("group_id");
            let rate_str: String = row.get("rate");
            rates.entry(broker_id).or_default().set_rate(
                GroupId::new(group),
                Decimal::from_str(&rate_str).unwrap_or_default(),
            );
        }

        let rows = sqlx::query(
            r#"
            SELECT b.user_id, u.referral_code, b.level, b.parent_id, b.root_id, b.is_active
            FROM brokers b
            JOIN users u ON u.id = b.user_id
            WHERE b.is_active = 1
            ORDER BY b.user_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let user_id: i64 = row.get("user_id");
                let parent_id: Option<i64> = row.get("parent_id");
                let root_id: Option<i64> = row.get("root_id");
                let is_active: i64 = row.get("is_active");
                Broker {
                    id: BrokerId::new(user_id),
                    referral_code: ReferralCode::new(row.get("referral_code")),
                    level: row.get("level"),
                    parent_id: parent_id.map(BrokerId::new),
                    root_id: root_id.map(BrokerId::new),
                    rates: rates.remove(&user_id).unwrap_or_default(),
                    is_active: is_active != 0,
                }
            })
            .collect())
    }

    /// Live (non-demo) trading accounts owned by a user.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn live_trading_accounts_for(
        &self,
        user: ClientId,
    ) -> Result<Vec<TradingAccount>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT login, group_id
            FROM trading_accounts
            WHERE user_id = ? AND is_demo = 0
            ORDER BY login ASC
            "#,
        )
        .bind(user.as_i64())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| TradingAccount {
                login: AccountLogin::new(row.get("login")),
                group: GroupId::new(row.get("group_id")),
            })
            .collect())
    }

    /// Create or update a user row (admin/approval flows and test seeding).
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub async fn upsert_user(
        &self,
        id: ClientId,
        referral_code: &ReferralCode,
        referred_by: Option<&ReferralCode>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO users (id, referral_code, referred_by, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                referral_code = excluded.referral_code,
                referred_by = excluded.referred_by
            "#,
        )
        .bind(id.as_i64())
        .bind(referral_code.as_str())
        .bind(referred_by.map(|c| c.as_str()))
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Approve (or re-approve) a user as a broker, replacing its rate table.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub async fn approve_broker(&self, broker: &Broker) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO brokers (user_id, level, parent_id, root_id, is_active)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                level = excluded.level,
                parent_id = excluded.parent_id,
                root_id = excluded.root_id,
                is_active = excluded.is_active
            "#,
        )
        .bind(broker.id.as_i64())
        .bind(broker.level)
        .bind(broker.parent_id.map(|p| p.as_i64()))
        .bind(broker.root_id.map(|r| r.as_i64()))
        .bind(broker.is_active as i64)
        .execute(&self.pool)
        .await?;

        sqlx::query("DELETE FROM broker_rates WHERE broker_id = ?")
            .bind(broker.id.as_i64())
            .execute(&self.pool)
            .await?;
        for (group, rate) in broker.rates.iter() {
            sqlx::query("INSERT INTO broker_rates (broker_id, group_id, rate) VALUES (?, ?, ?)")
                .bind(broker.id.as_i64())
                .bind(group.as_str())
                .bind(rate.to_canonical_string())
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    /// Deactivate a broker (ban flag); the record is kept, never deleted.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub async fn deactivate_broker(&self, id: BrokerId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE brokers SET is_active = 0 WHERE user_id = ?")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Register a trading account for a user.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub async fn add_trading_account(
        &self,
        login: AccountLogin,
        user: ClientId,
        group: &GroupId,
        is_demo: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO trading_accounts (login, user_id, group_id, is_demo)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(login) DO UPDATE SET
                user_id = excluded.user_id,
                group_id = excluded.group_id,
                is_demo = excluded.is_demo
            "#,
        )
        .bind(login.as_i64())
        .bind(user.as_i64())
        .bind(group.as_str())
        .bind(is_demo as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ReferralLookup for Repository {
    async fn users_referred_by(
        &self,
        code: &ReferralCode,
    ) -> Result<Vec<ReferredUser>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT u.id, u.referral_code,
                   EXISTS(SELECT 1 FROM brokers b WHERE b.user_id = u.id AND b.is_active = 1)
                       AS is_broker
            FROM users u
            WHERE u.referred_by = ?
            ORDER BY u.id ASC
            "#,
        )
        .bind(code.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let is_broker: i64 = row.get("is_broker");
                ReferredUser {
                    id: ClientId::new(row.get("id")),
                    referral_code: ReferralCode::new(row.get("referral_code")),
                    is_broker: is_broker != 0,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use tempfile::TempDir;

    async fn setup_test_db() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    fn code(s: &str) -> ReferralCode {
        ReferralCode::new(s.to_string())
    }

    fn group(s: &str) -> GroupId {
        GroupId::new(s.to_string())
    }

    fn make_broker(id: i64, level: i64, parent: Option<i64>, root: Option<i64>) -> Broker {
        Broker {
            id: BrokerId::new(id),
            referral_code: code(&format!("IB{}", id)),
            level,
            parent_id: parent.map(BrokerId::new),
            root_id: root.map(BrokerId::new),
            rates: RateTable::new().with_rate(group("fx"), Decimal::from_str("2.5").unwrap()),
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_approved_brokers_roundtrip() {
        let (repo, _temp) = setup_test_db().await;

        repo.upsert_user(ClientId::new(1), &code("IB1"), None)
            .await
            .unwrap();
        repo.approve_broker(&make_broker(1, 1, None, None))
            .await
            .unwrap();

        let brokers = repo.approved_brokers().await.unwrap();
        assert_eq!(brokers.len(), 1);
        assert_eq!(brokers[0].id, BrokerId::new(1));
        assert_eq!(
            brokers[0].rate_for(&group("fx")),
            Decimal::from_str("2.5").unwrap()
        );
        assert_eq!(brokers[0].rate_for(&group("metals")), Decimal::zero());
    }

    #[tokio::test]
    async fn test_deactivated_broker_not_listed() {
        let (repo, _temp) = setup_test_db().await;

        repo.upsert_user(ClientId::new(1), &code("IB1"), None)
            .await
            .unwrap();
        repo.approve_broker(&make_broker(1, 1, None, None))
            .await
            .unwrap();
        repo.deactivate_broker(BrokerId::new(1)).await.unwrap();

        assert!(repo.approved_brokers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_users_referred_by_flags_brokers() {
        let (repo, _temp) = setup_test_db().await;

        repo.upsert_user(ClientId::new(1), &code("IB1"), None)
            .await
            .unwrap();
        repo.upsert_user(ClientId::new(2), &code("IB2"), Some(&code("IB1")))
            .await
            .unwrap();
        repo.upsert_user(ClientId::new(3), &code("U3"), Some(&code("IB1")))
            .await
            .unwrap();
        repo.approve_broker(&make_broker(2, 2, Some(1), Some(1)))
            .await
            .unwrap();

        let referred = repo.users_referred_by(&code("IB1")).await.unwrap();
        assert_eq!(referred.len(), 2);
        assert!(referred.iter().any(|u| u.id == ClientId::new(2) && u.is_broker));
        assert!(referred.iter().any(|u| u.id == ClientId::new(3) && !u.is_broker));
    }

    #[tokio::test]
    async fn test_live_accounts_exclude_demo() {
        let (repo, _temp) = setup_test_db().await;

        repo.upsert_user(ClientId::new(3), &code("U3"), None)
            .await
            .unwrap();
        repo.add_trading_account(AccountLogin::new(500), ClientId::new(3), &group("fx"), false)
            .await
            .unwrap();
        repo.add_trading_account(AccountLogin::new(501), ClientId::new(3), &group("fx"), true)
            .await
            .unwrap();

        let accounts = repo
            .live_trading_accounts_for(ClientId::new(3))
            .await
            .unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].login, AccountLogin::new(500));
    }

    #[tokio::test]
    async fn test_approve_broker_replaces_rate_table() {
        let (repo, _temp) = setup_test_db().await;

        repo.upsert_user(ClientId::new(1), &code("IB1"), None)
            .await
            .unwrap();
        repo.approve_broker(&make_broker(1, 1, None, None))
            .await
            .unwrap();

        let mut updated = make_broker(1, 1, None, None);
        updated.rates = RateTable::new().with_rate(group("metals"), Decimal::from(3));
        repo.approve_broker(&updated).await.unwrap();

        let brokers = repo.approved_brokers().await.unwrap();
        assert_eq!(brokers[0].rate_for(&group("fx")), Decimal::zero());
        assert_eq!(brokers[0].rate_for(&group("metals")), Decimal::from(3));
    }
}
