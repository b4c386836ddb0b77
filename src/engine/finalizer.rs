//! Net realized option profit and the finalize-time policy effect.

use crate::domain::{Decimal, EntryKind, LedgerEntry, PremiumPolicy, StockLot, TimeMs};
use crate::engine::lots::{plan_reduce_basis, ReductionPlan};

/// Hours between finalization and a reinvest signal coming due.
pub const DEFAULT_GRACE_HOURS: i64 = 48;

/// Net realized option profit over an instance's ledger entries:
/// premiums received minus premiums paid minus fees.
///
/// Amounts are stored signed (credits positive, debits and fees negative),
/// so this is a plain signed sum over the NROP-relevant kinds.
pub fn compute_nrop(entries: &[LedgerEntry]) -> Decimal {
    entries
        .iter()
        .filter(|e| e.kind.counts_toward_nrop())
        .map(|e| e.amount)
        .sum()
}

/// The side effect a finalize call must apply, decided by the resolved
/// policy. Executes at most once per finalization and only when NROP > 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeEffect {
    /// Upsert a reinvest signal for the instance.
    CreateSignal { amount: Decimal, due_at: TimeMs },
    /// Distribute profit across the underlying's open lots.
    ReduceBasis(ReductionPlan),
    /// Earmark profit into the account's cashflow reserve.
    EarmarkCashflow { amount: Decimal },
    /// Nothing to do (no profit, or reduction with no open lots).
    None,
}

/// Decide the policy side effect for a finalization.
pub fn plan_finalize_effect(
    policy: PremiumPolicy,
    nrop: Decimal,
    finalized_at: TimeMs,
    grace_hours: i64,
    open_lots: &[StockLot],
) -> FinalizeEffect {
    if !nrop.is_positive() {
        return FinalizeEffect::None;
    }

    match policy {
        PremiumPolicy::ReinvestOnClose => FinalizeEffect::CreateSignal {
            amount: nrop,
            due_at: finalized_at.plus_hours(grace_hours),
        },
        PremiumPolicy::BasisReduction => {
            let plan = plan_reduce_basis(open_lots, nrop);
            if plan.reductions.is_empty() {
                FinalizeEffect::None
            } else {
                FinalizeEffect::ReduceBasis(plan)
            }
        }
        PremiumPolicy::Cashflow => FinalizeEffect::EarmarkCashflow { amount: nrop },
    }
}
