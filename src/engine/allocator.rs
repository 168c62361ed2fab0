//! Differential Allocator: telescoping marginal-rate distribution.
//!
//! Each participant earns only the margin its absolute rate adds above the
//! level(s) below it, so one trade's total payout never exceeds the top
//! absolute rate times volume on a well-configured chain.

use crate::domain::Decimal;
use crate::engine::{Allocation, ChainParticipant, TradeValidity};
use tracing::warn;

/// Compute each chain participant's share of one trade.
///
/// Participants are processed deepest level first with the root override
/// settling last; ordering is a correctness requirement for the running
/// `distributed_so_far` value, not a performance concern. Ineligible trades
/// still produce allocations, at amount 0, so the ledger records them.
pub fn allocate(
    chain: &[ChainParticipant],
    lots: Decimal,
    pip_value: Decimal,
    validity: &TradeValidity,
) -> Vec<Allocation> {
    let mut ordered = chain.to_vec();
    ordered.sort_by(|a, b| a.is_override.cmp(&b.is_override).then(b.level.cmp(&a.level)));

    let eligible = validity.is_eligible();
    let mut distributed_so_far = Decimal::zero();
    let mut allocations = Vec::with_capacity(ordered.len());

    for participant in ordered {
        let margin = participant.absolute_rate - distributed_so_far;
        if margin.is_negative() {
            warn!(
                broker = participant.broker_id.as_i64(),
                rate = %participant.absolute_rate,
                distributed = %distributed_so_far,
                "chain rate below deeper level, clamping marginal rate to 0"
            );
        }
        let marginal_rate = Decimal::zero().max(margin);
        let amount = if eligible {
            lots * marginal_rate * pip_value
        } else {
            Decimal::zero()
        };
        // Assignment, not accumulation: a misconfigured shallower level
        // clamps to 0 instead of driving later margins negative.
        distributed_so_far = participant.absolute_rate;

        allocations.push(Allocation {
            participant,
            marginal_rate,
            amount,
        });
    }

    allocations
}
