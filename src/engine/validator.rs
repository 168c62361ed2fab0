//! Trade Validator: eligibility rules applied before any money moves.

use crate::domain::{ClientId, ClosedTrade, EntryStatus, ExclusionReason};
use crate::engine::ChainParticipant;

/// Trades closed within this many seconds of opening pay nobody.
pub const MIN_TRADE_DURATION_SECS: i64 = 60;

/// Outcome of validating one trade against its commission chain.
///
/// Both rules apply uniformly to every participant: an excluded trade is
/// excluded for the whole chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeValidity {
    Eligible,
    Excluded(ExclusionReason),
}

impl TradeValidity {
    pub fn is_eligible(&self) -> bool {
        matches!(self, TradeValidity::Eligible)
    }

    pub fn status(&self) -> EntryStatus {
        match self {
            TradeValidity::Eligible => EntryStatus::Processed,
            TradeValidity::Excluded(_) => EntryStatus::Excluded,
        }
    }

    pub fn reason(&self) -> Option<ExclusionReason> {
        match self {
            TradeValidity::Eligible => None,
            TradeValidity::Excluded(reason) => Some(*reason),
        }
    }
}

/// Classify a trade. Self-dealing is checked first and unconditionally: if
/// the trading client sits anywhere in the earning chain, no level earns.
pub fn validate(trade: &ClosedTrade, chain: &[ChainParticipant], client: ClientId) -> TradeValidity {
    if chain.iter().any(|p| p.broker_id.as_i64() == client.as_i64()) {
        return TradeValidity::Excluded(ExclusionReason::SelfTrade);
    }
    if trade.duration_secs() <= MIN_TRADE_DURATION_SECS {
        return TradeValidity::Excluded(ExclusionReason::ShortDuration);
    }
    TradeValidity::Eligible
}
