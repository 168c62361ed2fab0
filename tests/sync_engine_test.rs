//! End-to-end commission distribution scenarios through the sync runner.

use ibsync::datasource::MockTradeFeed;
use ibsync::db::init_db;
use ibsync::orchestration::SyncRunner;
use ibsync::{
    AccountLogin, Broker, BrokerId, ClientId, ClosedTrade, Config, Decimal, EntryStatus, GroupId,
    RateTable, ReferralCode, Repository, Ticket, TimeS, TradeFeed,
};
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempDir;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn code(s: &str) -> ReferralCode {
    ReferralCode::new(s.to_string())
}

fn fx() -> GroupId {
    GroupId::new("fx".to_string())
}

fn test_config() -> Config {
    Config {
        database_path: ":memory:".to_string(),
        trade_api_url: "http://example.invalid".to_string(),
        lookback_hours: 24,
        fetch_timeout_secs: 10,
        pip_value: dec("10"),
    }
}

async fn setup_repo() -> (Arc<Repository>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    (Arc::new(Repository::new(pool)), temp_dir)
}

async fn seed_broker(
    repo: &Repository,
    id: i64,
    referred_by: Option<&str>,
    level: i64,
    parent: Option<i64>,
    root: Option<i64>,
    fx_rate: &str,
) {
    let ib_code = code(&format!("IB{}", id));
    repo.upsert_user(ClientId::new(id), &ib_code, referred_by.map(code).as_ref())
        .await
        .unwrap();
    repo.approve_broker(&Broker {
        id: BrokerId::new(id),
        referral_code: ib_code,
        level,
        parent_id: parent.map(BrokerId::new),
        root_id: root.map(BrokerId::new),
        rates: RateTable::new().with_rate(fx(), dec(fx_rate)),
        is_active: true,
    })
    .await
    .unwrap();
}

async fn seed_client(repo: &Repository, id: i64, referred_by: &str, login: i64) {
    repo.upsert_user(
        ClientId::new(id),
        &code(&format!("U{}", id)),
        Some(&code(referred_by)),
    )
    .await
    .unwrap();
    repo.add_trading_account(AccountLogin::new(login), ClientId::new(id), &fx(), false)
        .await
        .unwrap();
}

fn closed_trade(ticket: i64, login: i64, lots: &str, duration_secs: i64) -> ClosedTrade {
    let close = TimeS::new(TimeS::now().as_i64() - 300);
    ClosedTrade {
        ticket: Ticket::new(ticket),
        login: AccountLogin::new(login),
        symbol: "EURUSD".to_string(),
        lots: dec(lots),
        profit: dec("50"),
        open_time: TimeS::new(close.as_i64() - duration_secs),
        close_time: close,
    }
}

#[tokio::test]
async fn test_single_broker_earns_full_rate() {
    let (repo, _temp) = setup_repo().await;
    seed_broker(&repo, 1, None, 1, None, None, "2.0").await;
    seed_client(&repo, 9, "IB1", 600001).await;

    let feed: Arc<dyn TradeFeed> =
        Arc::new(MockTradeFeed::new().with_trade(closed_trade(900100, 600001, "1.5", 600)));
    let runner = SyncRunner::new(repo.clone(), feed, test_config());

    let report = runner.run().await.unwrap();
    assert_eq!(report.brokers_processed, 1);
    assert_eq!(report.trades_seen, 1);
    assert_eq!(report.entries_posted, 1);

    let entries = repo.entries_for_ticket(Ticket::new(900100)).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].broker_id, BrokerId::new(1));
    assert_eq!(entries[0].amount, dec("30"));
    assert_eq!(entries[0].rate, dec("2.0"));
    assert!(!entries[0].is_override);
    assert_eq!(entries[0].status, EntryStatus::Processed);

    let balance = repo.broker_balance(BrokerId::new(1)).await.unwrap();
    assert_eq!(balance, dec("30"));
}

#[tokio::test]
async fn test_two_level_chain_splits_differentially() {
    let (repo, _temp) = setup_repo().await;
    seed_broker(&repo, 1, None, 1, None, None, "2.5").await;
    seed_broker(&repo, 2, Some("IB1"), 2, Some(1), Some(1), "1.0").await;
    seed_client(&repo, 99, "IB2", 500123).await;

    let feed: Arc<dyn TradeFeed> =
        Arc::new(MockTradeFeed::new().with_trade(closed_trade(900200, 500123, "1.5", 600)));
    let runner = SyncRunner::new(repo.clone(), feed, test_config());

    let report = runner.run().await.unwrap();
    assert_eq!(report.brokers_processed, 2);
    assert_eq!(report.entries_posted, 2);

    let entries = repo.entries_for_ticket(Ticket::new(900200)).await.unwrap();
    assert_eq!(entries.len(), 2);

    // Deepest first: sub-broker at its full rate, master at the remainder.
    let sub = entries
        .iter()
        .find(|e| e.broker_id == BrokerId::new(2))
        .unwrap();
    assert_eq!(sub.amount, dec("15"));
    assert_eq!(sub.rate, dec("1.0"));
    assert_eq!(sub.chain_level, 2);
    assert!(!sub.is_override);

    let master = entries
        .iter()
        .find(|e| e.broker_id == BrokerId::new(1))
        .unwrap();
    assert_eq!(master.amount, dec("22.5"));
    assert_eq!(master.rate, dec("1.5"));
    assert_eq!(master.chain_level, 1);
    assert!(master.is_override);

    // No double counting: sum equals volume * top rate * pip value.
    let total = entries
        .iter()
        .fold(Decimal::zero(), |acc, e| acc + e.amount);
    assert_eq!(total, dec("1.5") * dec("2.5") * dec("10"));

    assert_eq!(repo.broker_balance(BrokerId::new(2)).await.unwrap(), dec("15"));
    assert_eq!(repo.broker_balance(BrokerId::new(1)).await.unwrap(), dec("22.5"));
}

#[tokio::test]
async fn test_short_trade_excluded_for_whole_chain() {
    let (repo, _temp) = setup_repo().await;
    seed_broker(&repo, 1, None, 1, None, None, "2.5").await;
    seed_broker(&repo, 2, Some("IB1"), 2, Some(1), Some(1), "1.0").await;
    seed_client(&repo, 99, "IB2", 500123).await;

    // 45 seconds: pays nobody, but both levels get audit rows.
    let feed: Arc<dyn TradeFeed> =
        Arc::new(MockTradeFeed::new().with_trade(closed_trade(900300, 500123, "1.5", 45)));
    let runner = SyncRunner::new(repo.clone(), feed, test_config());

    let report = runner.run().await.unwrap();
    assert_eq!(report.trades_excluded, 1);
    assert_eq!(report.entries_posted, 2);

    let entries = repo.entries_for_ticket(Ticket::new(900300)).await.unwrap();
    assert_eq!(entries.len(), 2);
    for entry in &entries {
        assert!(entry.amount.is_zero());
        assert_eq!(entry.status, EntryStatus::Excluded);
        assert_eq!(entry.duration_secs, 45);
        assert_eq!(
            entry.exclusion_reason.map(|r| r.as_str()),
            Some("trade duration <= 60 seconds")
        );
    }

    assert!(repo.broker_balance(BrokerId::new(1)).await.unwrap().is_zero());
    assert!(repo.broker_balance(BrokerId::new(2)).await.unwrap().is_zero());
}

#[tokio::test]
async fn test_broker_trading_own_downline_account_pays_nobody() {
    let (repo, _temp) = setup_repo().await;
    seed_broker(&repo, 1, None, 1, None, None, "2.5").await;
    // Corrupt referral: broker 2 sits in its own downline.
    seed_broker(&repo, 2, Some("IB2"), 2, Some(1), Some(1), "1.0").await;
    repo.add_trading_account(AccountLogin::new(700001), ClientId::new(2), &fx(), false)
        .await
        .unwrap();

    let feed: Arc<dyn TradeFeed> =
        Arc::new(MockTradeFeed::new().with_trade(closed_trade(900400, 700001, "1.5", 600)));
    let runner = SyncRunner::new(repo.clone(), feed, test_config());

    runner.run().await.unwrap();

    let entries = repo.entries_for_ticket(Ticket::new(900400)).await.unwrap();
    assert!(!entries.is_empty());
    for entry in &entries {
        assert!(entry.amount.is_zero());
        assert_eq!(entry.status, EntryStatus::Excluded);
        assert_eq!(entry.exclusion_reason.map(|r| r.as_str()), Some("self-trade"));
    }
    assert!(repo.broker_balance(BrokerId::new(2)).await.unwrap().is_zero());
    assert!(repo.broker_balance(BrokerId::new(1)).await.unwrap().is_zero());
}

#[tokio::test]
async fn test_demo_accounts_ignored() {
    let (repo, _temp) = setup_repo().await;
    seed_broker(&repo, 1, None, 1, None, None, "2.0").await;
    repo.upsert_user(ClientId::new(9), &code("U9"), Some(&code("IB1")))
        .await
        .unwrap();
    repo.add_trading_account(AccountLogin::new(600001), ClientId::new(9), &fx(), true)
        .await
        .unwrap();

    let feed: Arc<dyn TradeFeed> =
        Arc::new(MockTradeFeed::new().with_trade(closed_trade(900500, 600001, "1.5", 600)));
    let runner = SyncRunner::new(repo.clone(), feed, test_config());

    let report = runner.run().await.unwrap();
    assert_eq!(report.accounts_scanned, 0);
    assert_eq!(report.entries_posted, 0);
}

#[tokio::test]
async fn test_trade_outside_lookback_window_ignored() {
    let (repo, _temp) = setup_repo().await;
    seed_broker(&repo, 1, None, 1, None, None, "2.0").await;
    seed_client(&repo, 9, "IB1", 600001).await;

    let stale_close = TimeS::new(TimeS::now().as_i64() - 48 * 3600);
    let stale = ClosedTrade {
        ticket: Ticket::new(900600),
        login: AccountLogin::new(600001),
        symbol: "EURUSD".to_string(),
        lots: dec("1.0"),
        profit: dec("0"),
        open_time: TimeS::new(stale_close.as_i64() - 600),
        close_time: stale_close,
    };

    let feed: Arc<dyn TradeFeed> = Arc::new(MockTradeFeed::new().with_trade(stale));
    let runner = SyncRunner::new(repo.clone(), feed, test_config());

    let report = runner.run().await.unwrap();
    assert_eq!(report.trades_seen, 0);
    assert_eq!(report.entries_posted, 0);
}
