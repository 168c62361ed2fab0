//! Broker records and per-instrument-group rate tables.

use crate::domain::{BrokerId, Decimal, GroupId, ReferralCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-instrument-group commission rates in pips per lot, set by an
/// administrator. A group with no configured rate pays 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTable {
    rates: HashMap<GroupId, Decimal>,
}

impl RateTable {
    pub fn new() -> Self {
        Self {
            rates: HashMap::new(),
        }
    }

    /// Set the rate for one group (builder-style).
    pub fn with_rate(mut self, group: GroupId, rate: Decimal) -> Self {
        self.rates.insert(group, rate);
        self
    }

    pub fn set_rate(&mut self, group: GroupId, rate: Decimal) {
        self.rates.insert(group, rate);
    }

    /// The broker's rate for a group; 0 when unset so the allocator's
    /// differencing still sees every chain level explicitly.
    pub fn rate_for(&self, group: &GroupId) -> Decimal {
        self.rates.get(group).copied().unwrap_or_else(Decimal::zero)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GroupId, &Decimal)> {
        self.rates.iter()
    }
}

/// An approved introducing broker.
///
/// Brokers are never deleted; deactivation clears `is_active` and the
/// resolver degrades the broker's chain slot to rate 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Broker {
    pub id: BrokerId,
    pub referral_code: ReferralCode,
    /// Hierarchy level, 1 = top-level master, increasing with depth.
    pub level: i64,
    /// Immediate parent broker; None means root/master.
    pub parent_id: Option<BrokerId>,
    /// Denormalized pointer to the top of this broker's chain.
    pub root_id: Option<BrokerId>,
    pub rates: RateTable,
    pub is_active: bool,
}

impl Broker {
    pub fn rate_for(&self, group: &GroupId) -> Decimal {
        self.rates.rate_for(group)
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}
