//! Ledger entry types: one immutable row per (trade ticket, earning broker).

use crate::domain::{BrokerId, ClientId, Decimal, GroupId, Ticket, TimeS};
use serde::{Deserialize, Serialize};

/// Eligibility status of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Commission computed and (if positive) credited.
    Processed,
    /// Trade failed a validity rule; recorded at zero amount for audit.
    Excluded,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Processed => "processed",
            EntryStatus::Excluded => "excluded",
        }
    }

    pub fn from_str_db(s: &str) -> Option<Self> {
        match s {
            "processed" => Some(EntryStatus::Processed),
            "excluded" => Some(EntryStatus::Excluded),
            _ => None,
        }
    }
}

/// Why a trade was excluded from commission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    /// The earning broker is the trading client.
    SelfTrade,
    /// Trade closed within 60 seconds of opening.
    ShortDuration,
}

impl ExclusionReason {
    /// Human-readable reason stored on the ledger row.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExclusionReason::SelfTrade => "self-trade",
            ExclusionReason::ShortDuration => "trade duration <= 60 seconds",
        }
    }
}

impl std::fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One participant's earned (or explicitly excluded) commission for one
/// trade. The (ticket, broker_id) pair is the idempotency key: re-posting
/// an existing pair is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub ticket: Ticket,
    pub broker_id: BrokerId,
    pub client_id: ClientId,
    pub symbol: String,
    pub group: GroupId,
    pub lots: Decimal,
    pub profit: Decimal,
    /// The differential (marginal) rate applied to this broker, not the
    /// broker's absolute configured rate.
    pub rate: Decimal,
    pub pip_value: Decimal,
    pub amount: Decimal,
    pub open_time: TimeS,
    pub close_time: TimeS,
    pub duration_secs: i64,
    pub status: EntryStatus,
    pub exclusion_reason: Option<ExclusionReason>,
    /// The broker's level in the chain at time of posting.
    pub chain_level: i64,
    /// True only for the root master's top-of-chain remainder.
    pub is_override: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [EntryStatus::Processed, EntryStatus::Excluded] {
            assert_eq!(EntryStatus::from_str_db(status.as_str()), Some(status));
        }
        assert_eq!(EntryStatus::from_str_db("pending"), None);
    }

    #[test]
    fn test_exclusion_reason_strings() {
        assert_eq!(ExclusionReason::SelfTrade.as_str(), "self-trade");
        assert_eq!(
            ExclusionReason::ShortDuration.to_string(),
            "trade duration <= 60 seconds"
        );
    }
}
