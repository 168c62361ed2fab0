//! Sync Orchestrator: the periodic batch driver.
//!
//! One run walks every approved broker's referral subtree, fetches each
//! client account's recently closed trades, and feeds each trade through
//! validation, differential allocation, and the ledger writer. Failures
//! isolate at the narrowest useful scope: a bad account skips that
//! account, a bad broker fails only that broker, and a failed participant
//! write rolls back only that participant.

use crate::config::Config;
use crate::datasource::TradeFeed;
use crate::db::Repository;
use crate::domain::{BrokerId, ClientId, ClosedTrade, GroupId, LedgerEntry, TimeS};
use crate::engine::{allocate, validate, walk_referrals, BrokerDirectory};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct SyncRunner {
    repo: Arc<Repository>,
    feed: Arc<dyn TradeFeed>,
    config: Config,
}

/// Counters for one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub brokers_processed: usize,
    pub brokers_failed: usize,
    pub accounts_scanned: usize,
    pub accounts_skipped: usize,
    pub trades_seen: usize,
    pub trades_excluded: usize,
    pub entries_posted: usize,
    pub entries_skipped: usize,
    pub entries_failed: usize,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl SyncRunner {
    pub fn new(repo: Arc<Repository>, feed: Arc<dyn TradeFeed>, config: Config) -> Self {
        Self { repo, feed, config }
    }

    /// Execute one batch run over the configured lookback window.
    ///
    /// Already-committed entries are final, so a run cancelled between
    /// brokers leaves nothing to repair; the next scheduled run picks up
    /// the remaining trades.
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let run_id = Uuid::new_v4();
        let to = TimeS::now();
        let from = TimeS::new(to.as_i64() - self.config.lookback_hours * 3600);

        let directory = BrokerDirectory::new(self.repo.approved_brokers().await?);
        info!(
            %run_id,
            brokers = directory.len(),
            from = from.as_i64(),
            to = to.as_i64(),
            "commission sync started"
        );

        let mut brokers: Vec<_> = directory.iter().cloned().collect();
        brokers.sort_by_key(|b| b.id);

        let mut report = SyncReport::default();
        let mut seen_users: HashSet<ClientId> = HashSet::new();

        for broker in &brokers {
            match self
                .process_broker(broker.id, &broker.referral_code, &directory, from, to, &mut seen_users, &mut report)
                .await
            {
                Ok(()) => report.brokers_processed += 1,
                Err(e) => {
                    warn!("broker {} failed, continuing with the rest: {}", broker.id, e);
                    report.brokers_failed += 1;
                }
            }
        }

        info!(%run_id, ?report, "commission sync finished");
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_broker(
        &self,
        broker: BrokerId,
        code: &crate::domain::ReferralCode,
        directory: &BrokerDirectory,
        from: TimeS,
        to: TimeS,
        seen_users: &mut HashSet<ClientId>,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let referred = walk_referrals(self.repo.as_ref(), broker, code).await?;

        for account_holder in referred {
            // A client reachable from several ancestors is fetched once per
            // run; (ticket, broker) idempotency covers any overlap anyway.
            if !seen_users.insert(account_holder.user_id) {
                continue;
            }

            let accounts = self
                .repo
                .live_trading_accounts_for(account_holder.user_id)
                .await?;

            for account in accounts {
                report.accounts_scanned += 1;
                let trades = match self.feed.fetch_closed_trades(account.login, from, to).await {
                    Ok(trades) => trades,
                    Err(e) => {
                        // Transient fetch failure: defer this account to the
                        // next run, keep the batch going.
                        warn!("skipping account {}: {}", account.login, e);
                        report.accounts_skipped += 1;
                        continue;
                    }
                };

                for trade in trades {
                    report.trades_seen += 1;
                    self.process_trade(
                        &trade,
                        account_holder.user_id,
                        account_holder.direct_broker,
                        &account.group,
                        directory,
                        report,
                    )
                    .await;
                }
            }
        }

        Ok(())
    }

    /// Validate, allocate, and post one trade's whole chain. Participants
    /// settle deepest-first; each gets its own transaction so one failed
    /// write never blocks siblings already committed.
    async fn process_trade(
        &self,
        trade: &ClosedTrade,
        client: ClientId,
        direct_broker: BrokerId,
        group: &GroupId,
        directory: &BrokerDirectory,
        report: &mut SyncReport,
    ) {
        let chain = directory.commission_chain(direct_broker, group);
        if chain.is_empty() {
            warn!("no commission chain for trade {}, skipping", trade.ticket);
            return;
        }

        let validity = validate(trade, &chain, client);
        if !validity.is_eligible() {
            report.trades_excluded += 1;
        }

        for allocation in allocate(&chain, trade.lots, self.config.pip_value, &validity) {
            let entry = LedgerEntry {
                ticket: trade.ticket,
                broker_id: allocation.participant.broker_id,
                client_id: client,
                symbol: trade.symbol.clone(),
                group: group.clone(),
                lots: trade.lots,
                profit: trade.profit,
                rate: allocation.marginal_rate,
                pip_value: self.config.pip_value,
                amount: allocation.amount,
                open_time: trade.open_time,
                close_time: trade.close_time,
                duration_secs: trade.duration_secs(),
                status: validity.status(),
                exclusion_reason: validity.reason(),
                chain_level: allocation.participant.level,
                is_override: allocation.participant.is_override,
            };

            match self.repo.post_entry(&entry).await {
                Ok(true) => report.entries_posted += 1,
                Ok(false) => report.entries_skipped += 1,
                Err(e) => {
                    // Rolled back for this participant only; the trade is
                    // still fetchable next run and the idempotency check
                    // will see it as unwritten.
                    warn!(
                        "failed to post entry for trade {} broker {}: {}",
                        trade.ticket, entry.broker_id, e
                    );
                    report.entries_failed += 1;
                }
            }
        }
    }
}
