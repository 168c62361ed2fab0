//! Pure computation engines for deterministic commission logic.

use crate::domain::{BrokerId, Decimal};

pub mod allocator;
pub mod chain;
pub mod referrals;
pub mod validator;

pub use allocator::allocate;
pub use chain::{BrokerDirectory, MAX_CHAIN_DEPTH};
pub use referrals::{walk_referrals, ReferralLookup, ReferredAccount, ReferredUser, MAX_REFERRAL_DEPTH};
pub use validator::{validate, TradeValidity, MIN_TRADE_DURATION_SECS};

/// One level of a trade's commission chain: a broker together with its
/// absolute configured rate for the trade's instrument group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainParticipant {
    pub broker_id: BrokerId,
    pub level: i64,
    /// The broker's absolute rate for the group, 0 when unset or when the
    /// broker record is missing (deactivated mid-chain).
    pub absolute_rate: Decimal,
    /// True for the root master's top-of-chain remainder slot.
    pub is_override: bool,
}

/// A participant's computed share of one trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub participant: ChainParticipant,
    /// The marginal rate actually applied: absolute rate minus what deeper
    /// levels already captured, clamped at zero.
    pub marginal_rate: Decimal,
    pub amount: Decimal,
}
