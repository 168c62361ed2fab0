//! Rate Table Resolver: builds the ordered commission chain for a trade
//! from an in-memory snapshot of the approved brokers.

use crate::domain::{Broker, BrokerId, Decimal, GroupId, ReferralCode};
use crate::engine::ChainParticipant;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Upper bound on parent hops, guarding against cycles or corrupt links.
pub const MAX_CHAIN_DEPTH: usize = 10;

/// Snapshot of all approved brokers, loaded once per sync run.
///
/// Chain resolution is pure and synchronous over this snapshot; the only
/// suspension points of a run stay at the store and feed boundaries.
#[derive(Debug, Clone, Default)]
pub struct BrokerDirectory {
    by_id: HashMap<BrokerId, Broker>,
    by_code: HashMap<ReferralCode, BrokerId>,
}

impl BrokerDirectory {
    pub fn new(brokers: Vec<Broker>) -> Self {
        let mut by_id = HashMap::new();
        let mut by_code = HashMap::new();
        for broker in brokers {
            by_code.insert(broker.referral_code.clone(), broker.id);
            by_id.insert(broker.id, broker);
        }
        Self { by_id, by_code }
    }

    pub fn get(&self, id: BrokerId) -> Option<&Broker> {
        self.by_id.get(&id)
    }

    pub fn by_code(&self, code: &ReferralCode) -> Option<&Broker> {
        self.by_code.get(code).and_then(|id| self.by_id.get(id))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Broker> {
        self.by_id.values()
    }

    /// Build the ordered participant list for a trade earned first by
    /// `direct`: the direct broker (deepest), each ancestor up the parent
    /// chain, and the root master flagged as the override slot.
    ///
    /// An ancestor whose broker record is gone (deactivated) still occupies
    /// its chain slot at rate 0 so the chain above it keeps earning; the
    /// denormalized `root_id` lets the master be reached even when an
    /// intermediate record is missing.
    pub fn commission_chain(&self, direct: BrokerId, group: &GroupId) -> Vec<ChainParticipant> {
        let mut chain = Vec::new();

        let Some(direct_broker) = self.get(direct) else {
            warn!("direct broker {} not in approved directory, empty chain", direct);
            return chain;
        };

        let mut visited: HashSet<BrokerId> = HashSet::new();
        visited.insert(direct_broker.id);
        chain.push(ChainParticipant {
            broker_id: direct_broker.id,
            level: direct_broker.level,
            absolute_rate: direct_broker.rate_for(group),
            is_override: false,
        });

        let mut cursor = direct_broker;
        while chain.len() < MAX_CHAIN_DEPTH {
            let Some(parent_id) = cursor.parent_id else {
                break;
            };
            if !visited.insert(parent_id) {
                warn!("referral chain cycle at broker {}, truncating", parent_id);
                break;
            }
            match self.get(parent_id) {
                Some(parent) => {
                    chain.push(ChainParticipant {
                        broker_id: parent.id,
                        level: parent.level,
                        absolute_rate: parent.rate_for(group),
                        is_override: false,
                    });
                    cursor = parent;
                }
                None => {
                    // Deactivated mid-chain: zero-rate slot, then fall
                    // through to the root below since the parent link ends here.
                    warn!(
                        "ancestor broker {} missing from directory, treating rate as 0",
                        parent_id
                    );
                    chain.push(ChainParticipant {
                        broker_id: parent_id,
                        level: (cursor.level - 1).max(1),
                        absolute_rate: Decimal::zero(),
                        is_override: false,
                    });
                    break;
                }
            }
        }

        if let Some(root_id) = direct_broker.root_id {
            if let Some(pos) = chain.iter().position(|p| p.broker_id == root_id) {
                // Root reached via parent links; its entry carries the
                // override remainder unless it is the lone direct earner.
                if chain.len() > 1 {
                    chain[pos].is_override = true;
                }
            } else if chain.len() < MAX_CHAIN_DEPTH {
                let (level, rate) = match self.get(root_id) {
                    Some(root) => (root.level, root.rate_for(group)),
                    None => {
                        warn!(
                            "root master {} missing from directory, treating rate as 0",
                            root_id
                        );
                        (1, Decimal::zero())
                    }
                };
                chain.push(ChainParticipant {
                    broker_id: root_id,
                    level,
                    absolute_rate: rate,
                    is_override: true,
                });
            }
        }

        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RateTable;
    use std::str::FromStr;

    fn group(name: &str) -> GroupId {
        GroupId::new(name.to_string())
    }

    fn broker(id: i64, level: i64, parent: Option<i64>, root: Option<i64>, rate: &str) -> Broker {
        Broker {
            id: BrokerId::new(id),
            referral_code: ReferralCode::new(format!("IB{}", id)),
            level,
            parent_id: parent.map(BrokerId::new),
            root_id: root.map(BrokerId::new),
            rates: RateTable::new().with_rate(group("fx"), Decimal::from_str(rate).unwrap()),
            is_active: true,
        }
    }

    #[test]
    fn test_single_broker_chain_no_override() {
        let dir = BrokerDirectory::new(vec![broker(1, 1, None, None, "2.0")]);
        let chain = dir.commission_chain(BrokerId::new(1), &group("fx"));

        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].broker_id, BrokerId::new(1));
        assert_eq!(chain[0].absolute_rate, Decimal::from_str("2.0").unwrap());
        assert!(!chain[0].is_override);
    }

    #[test]
    fn test_two_level_chain_marks_root_override() {
        let dir = BrokerDirectory::new(vec![
            broker(1, 1, None, None, "2.5"),
            broker(2, 2, Some(1), Some(1), "1.0"),
        ]);
        let chain = dir.commission_chain(BrokerId::new(2), &group("fx"));

        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].broker_id, BrokerId::new(2));
        assert!(!chain[0].is_override);
        assert_eq!(chain[1].broker_id, BrokerId::new(1));
        assert!(chain[1].is_override);
        assert_eq!(chain[1].absolute_rate, Decimal::from_str("2.5").unwrap());
    }

    #[test]
    fn test_unset_group_rate_is_explicit_zero_slot() {
        let dir = BrokerDirectory::new(vec![
            broker(1, 1, None, None, "2.5"),
            broker(2, 2, Some(1), Some(1), "1.0"),
        ]);
        let chain = dir.commission_chain(BrokerId::new(2), &group("metals"));

        // Both levels present, both at 0: absence is represented, not omitted.
        assert_eq!(chain.len(), 2);
        assert!(chain.iter().all(|p| p.absolute_rate.is_zero()));
    }

    #[test]
    fn test_missing_ancestor_degrades_to_zero_and_root_still_reached() {
        // Broker 3 -> 2 (missing) -> root 1.
        let dir = BrokerDirectory::new(vec![
            broker(1, 1, None, None, "3.0"),
            broker(3, 3, Some(2), Some(1), "1.0"),
        ]);
        let chain = dir.commission_chain(BrokerId::new(3), &group("fx"));

        assert_eq!(chain.len(), 3);
        assert_eq!(chain[1].broker_id, BrokerId::new(2));
        assert!(chain[1].absolute_rate.is_zero());
        assert_eq!(chain[2].broker_id, BrokerId::new(1));
        assert!(chain[2].is_override);
        assert_eq!(chain[2].absolute_rate, Decimal::from_str("3.0").unwrap());
    }

    #[test]
    fn test_cycle_terminates() {
        let dir = BrokerDirectory::new(vec![
            broker(1, 1, Some(2), None, "2.0"),
            broker(2, 2, Some(1), None, "1.0"),
        ]);
        let chain = dir.commission_chain(BrokerId::new(2), &group("fx"));

        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_depth_cap() {
        // 12-deep parent chain gets truncated at MAX_CHAIN_DEPTH.
        let mut brokers = vec![broker(1, 1, None, None, "5.0")];
        for id in 2..=12 {
            brokers.push(broker(id, id, Some(id - 1), Some(1), "1.0"));
        }
        let dir = BrokerDirectory::new(brokers);
        let chain = dir.commission_chain(BrokerId::new(12), &group("fx"));

        assert_eq!(chain.len(), MAX_CHAIN_DEPTH);
    }

    #[test]
    fn test_unknown_direct_broker_yields_empty_chain() {
        let dir = BrokerDirectory::new(vec![broker(1, 1, None, None, "2.0")]);
        assert!(dir.commission_chain(BrokerId::new(99), &group("fx")).is_empty());
    }

    #[test]
    fn test_lookup_by_code() {
        let dir = BrokerDirectory::new(vec![broker(7, 1, None, None, "2.0")]);
        let found = dir.by_code(&ReferralCode::new("IB7".to_string())).unwrap();
        assert_eq!(found.id, BrokerId::new(7));
        assert!(dir.by_code(&ReferralCode::new("nope".to_string())).is_none());
    }
}
