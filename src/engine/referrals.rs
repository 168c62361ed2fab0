//! Referral Graph Walker: bounded traversal of the referred-by forest.
//!
//! The walk is an iterative worklist with a depth counter and a visited
//! set, so corrupt data (a referral cycle) terminates instead of recursing.
//! It is read-only and deterministic for a given graph snapshot; the CRM's
//! referral-tree display pages reuse it outside the engine.

use crate::domain::{BrokerId, ClientId, ReferralCode};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};

/// Hard bound on referral depth.
pub const MAX_REFERRAL_DEPTH: u32 = 10;

/// One row of the referral edge query: a user whose `referred_by` equals
/// the queried referral code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferredUser {
    pub id: ClientId,
    pub referral_code: ReferralCode,
    pub is_broker: bool,
}

/// Read seam over the referral store, implemented by the repository and by
/// in-memory doubles in tests.
#[async_trait]
pub trait ReferralLookup: Send + Sync {
    async fn users_referred_by(
        &self,
        code: &ReferralCode,
    ) -> Result<Vec<ReferredUser>, sqlx::Error>;
}

/// A transitively referred account discovered by the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferredAccount {
    pub user_id: ClientId,
    pub referral_code: ReferralCode,
    /// Relative depth from the walked broker, 1 = direct referral.
    pub depth: u32,
    pub is_broker: bool,
    /// Nearest approved-broker ancestor on the walk path. Plain users in
    /// the referral path earn nothing and contribute no chain level, so
    /// this is the earner of first resort for the account's trades.
    pub direct_broker: BrokerId,
}

/// Enumerate every account transitively referred by `code`, breadth-first.
pub async fn walk_referrals(
    lookup: &dyn ReferralLookup,
    broker: BrokerId,
    code: &ReferralCode,
) -> Result<Vec<ReferredAccount>, sqlx::Error> {
    let mut accounts = Vec::new();
    let mut visited: HashSet<ClientId> = HashSet::new();
    let mut worklist: VecDeque<(ReferralCode, u32, BrokerId)> = VecDeque::new();
    worklist.push_back((code.clone(), 1, broker));

    while let Some((code, depth, earner)) = worklist.pop_front() {
        for user in lookup.users_referred_by(&code).await? {
            if !visited.insert(user.id) {
                continue;
            }
            let next_earner = if user.is_broker {
                BrokerId::new(user.id.as_i64())
            } else {
                earner
            };
            if depth < MAX_REFERRAL_DEPTH {
                worklist.push_back((user.referral_code.clone(), depth + 1, next_earner));
            }
            accounts.push(ReferredAccount {
                user_id: user.id,
                referral_code: user.referral_code,
                depth,
                is_broker: user.is_broker,
                direct_broker: earner,
            });
        }
    }

    Ok(accounts)
}
