//! Share lots: discrete acquisitions with their own cost basis.

use crate::domain::{Decimal, TimeMs};
use serde::{Deserialize, Serialize};

/// An immutable acquisition record, consumed FIFO.
///
/// Invariants: `0 <= |remaining| <= |quantity|` and the sign of
/// `remaining` matches the sign of `quantity` (negative = short lot).
/// Mutated only by consumption (remaining decreases toward zero) and
/// basis reduction (premium_reduction accumulates).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockLot {
    pub id: i64,
    pub account_id: i64,
    pub underlying_id: i64,
    /// Original acquired quantity, signed.
    pub quantity: Decimal,
    /// Quantity still open, signed, same sign as `quantity`.
    pub remaining: Decimal,
    /// Original total cost basis for the full `quantity`, signed like it.
    pub cost_basis: Decimal,
    /// Monotonically accumulating premium reduction applied to this lot.
    pub premium_reduction: Decimal,
    pub acquired_at: TimeMs,
}

impl StockLot {
    /// True while any quantity remains open.
    pub fn is_open(&self) -> bool {
        !self.remaining.is_zero()
    }

    /// Per-share cost derived from the ORIGINAL quantity, never from
    /// remaining, so partial fills stay proportionally correct.
    pub fn per_share_cost(&self) -> Decimal {
        self.cost_basis / self.quantity
    }

    /// Open cost basis before premium reductions.
    pub fn open_basis(&self) -> Decimal {
        self.per_share_cost() * self.remaining
    }

    /// Open cost basis after accumulated premium reductions.
    pub fn adjusted_open_basis(&self) -> Decimal {
        self.open_basis() - self.premium_reduction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn lot(quantity: &str, remaining: &str, cost_basis: &str, reduction: &str) -> StockLot {
        StockLot {
            id: 1,
            account_id: 1,
            underlying_id: 1,
            quantity: Decimal::from_str(quantity).unwrap(),
            remaining: Decimal::from_str(remaining).unwrap(),
            cost_basis: Decimal::from_str(cost_basis).unwrap(),
            premium_reduction: Decimal::from_str(reduction).unwrap(),
            acquired_at: TimeMs::new(0),
        }
    }

    #[test]
    fn test_per_share_cost_uses_original_quantity() {
        let l = lot("100", "40", "1000", "0");
        assert_eq!(l.per_share_cost().to_canonical_string(), "10");
        assert_eq!(l.open_basis().to_canonical_string(), "400");
    }

    #[test]
    fn test_adjusted_open_basis_subtracts_reduction() {
        let l = lot("100", "100", "1000", "150");
        assert_eq!(l.adjusted_open_basis().to_canonical_string(), "850");
    }

    #[test]
    fn test_short_lot_basis_keeps_sign() {
        let l = lot("-50", "-50", "-500", "0");
        assert_eq!(l.per_share_cost().to_canonical_string(), "10");
        assert_eq!(l.open_basis().to_canonical_string(), "-500");
        assert!(l.is_open());
    }
}
