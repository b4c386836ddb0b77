//! Wealth allocation: four-category percentage breakdown against targets.

use crate::domain::{Decimal, WheelCategory, WheelTarget};
use serde::Serialize;

/// One category's slice of the wealth wheel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAllocation {
    pub category: WheelCategory,
    /// Adjusted open basis (plus cash for FREE_CAPITAL).
    pub total: Decimal,
    pub actual_pct: Decimal,
    pub target_pct: Decimal,
    pub delta_pct: Decimal,
}

/// Compute the allocation breakdown.
///
/// `basis_by_category` carries each classified underlying's adjusted open
/// basis; `free_cash` lands in FREE_CAPITAL. Purely derived from current
/// lot and cash state, so it is always consistent with the latest ledger
/// activity. Percentages are zero when the grand total is zero.
pub fn compute_allocation(
    basis_by_category: &[(WheelCategory, Decimal)],
    free_cash: Decimal,
    targets: &[WheelTarget],
) -> Vec<CategoryAllocation> {
    let mut totals: Vec<(WheelCategory, Decimal)> = WheelCategory::ALL
        .iter()
        .map(|c| (*c, Decimal::zero()))
        .collect();

    for (category, basis) in basis_by_category {
        if let Some(slot) = totals.iter_mut().find(|(c, _)| c == category) {
            slot.1 = slot.1 + *basis;
        }
    }
    if let Some(slot) = totals
        .iter_mut()
        .find(|(c, _)| *c == WheelCategory::FreeCapital)
    {
        slot.1 = slot.1 + free_cash;
    }

    let grand_total: Decimal = totals.iter().map(|(_, t)| *t).sum();

    totals
        .into_iter()
        .map(|(category, total)| {
            let actual_pct = if grand_total.is_zero() {
                Decimal::zero()
            } else {
                (total / grand_total * Decimal::hundred()).round_dp(4)
            };
            let target_pct = targets
                .iter()
                .find(|t| t.category == category)
                .map(|t| t.target_pct)
                .unwrap_or_else(Decimal::zero);

            CategoryAllocation {
                category,
                total,
                actual_pct,
                target_pct,
                delta_pct: actual_pct - target_pct,
            }
        })
        .collect()
}
