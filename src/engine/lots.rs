//! FIFO lot consumption and proportional basis reduction.
//!
//! Pure planning functions over in-memory lot slices. The repository
//! applies a plan's writes atomically; nothing here touches the database.

use crate::domain::{Decimal, StockLot, TimeMs};
use thiserror::Error;

/// How to treat a sell that exceeds the open long quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OversellMode {
    /// Synthesize a negative-quantity lot for the excess (models opening
    /// a short position from a sell with no prior holding).
    #[default]
    Short,
    /// Fail with `InsufficientShares`.
    Reject,
}

impl OversellMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "short" => Some(OversellMode::Short),
            "reject" => Some(OversellMode::Reject),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LotError {
    #[error("insufficient shares: requested {requested}, available {available}")]
    InsufficientShares {
        requested: Decimal,
        available: Decimal,
    },
    #[error("quantity must be positive, got {0}")]
    NonPositiveQuantity(Decimal),
}

/// A lot to be created (acquisition or synthesized short).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLot {
    pub quantity: Decimal,
    pub cost_basis: Decimal,
    pub acquired_at: TimeMs,
}

/// Plan a new acquisition. Always a fresh lot; lots are never merged.
pub fn plan_acquire(quantity: Decimal, cost_basis: Decimal, acquired_at: TimeMs) -> NewLot {
    NewLot {
        quantity,
        cost_basis,
        acquired_at,
    }
}

/// One lot partially or fully consumed by a sell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedPortion {
    pub lot_id: i64,
    /// Quantity taken from this lot.
    pub quantity: Decimal,
    /// Cost basis consumed: `per_share_cost(original) * quantity`.
    pub cost_basis: Decimal,
    pub new_remaining: Decimal,
}

/// The outcome of planning a sell against open lots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumePlan {
    pub portions: Vec<ConsumedPortion>,
    /// Present when the sell exceeded open shares under `OversellMode::Short`.
    pub short_lot: Option<NewLot>,
    /// Total original-cost basis consumed from long lots.
    pub total_cost_basis: Decimal,
    /// Full proceeds of the sell (`quantity * sell_price`).
    pub total_proceeds: Decimal,
    /// Realized gain on the long portion only:
    /// `consumed_qty * sell_price - total_cost_basis`.
    pub realized_gain: Decimal,
}

/// Plan consuming `quantity` shares oldest-acquired-first.
///
/// Per-share cost always derives from a lot's ORIGINAL quantity so partial
/// fills stay proportionally correct. `lots` may arrive in any order; only
/// lots with positive remaining participate.
pub fn plan_consume(
    lots: &[StockLot],
    quantity: Decimal,
    sell_price: Decimal,
    occurred_at: TimeMs,
    mode: OversellMode,
) -> Result<ConsumePlan, LotError> {
    if !quantity.is_positive() {
        return Err(LotError::NonPositiveQuantity(quantity));
    }

    let mut open: Vec<&StockLot> = lots.iter().filter(|l| l.remaining.is_positive()).collect();
    open.sort_by_key(|l| (l.acquired_at, l.id));

    let available: Decimal = open.iter().map(|l| l.remaining).sum();
    if quantity > available && mode == OversellMode::Reject {
        return Err(LotError::InsufficientShares {
            requested: quantity,
            available,
        });
    }

    let mut needed = quantity;
    let mut portions = Vec::new();
    let mut total_cost_basis = Decimal::zero();
    let mut consumed_qty = Decimal::zero();

    for lot in open {
        if needed.is_zero() {
            break;
        }
        let take = lot.remaining.min(needed);
        let cost = lot.per_share_cost() * take;

        portions.push(ConsumedPortion {
            lot_id: lot.id,
            quantity: take,
            cost_basis: cost,
            new_remaining: lot.remaining - take,
        });

        total_cost_basis = total_cost_basis + cost;
        consumed_qty = consumed_qty + take;
        needed = needed - take;
    }

    // Any excess opens a short lot whose basis is the sale proceeds for
    // that portion, sign-matched to the negative quantity.
    let short_lot = if needed.is_positive() {
        Some(NewLot {
            quantity: -needed,
            cost_basis: -(needed * sell_price),
            acquired_at: occurred_at,
        })
    } else {
        None
    };

    let total_proceeds = quantity * sell_price;
    let realized_gain = consumed_qty * sell_price - total_cost_basis;

    Ok(ConsumePlan {
        portions,
        short_lot,
        total_cost_basis,
        total_proceeds,
        realized_gain,
    })
}

/// One lot's share of a basis reduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotReduction {
    pub lot_id: i64,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReductionPlan {
    pub reductions: Vec<LotReduction>,
    /// Exactly equals the requested premium amount whenever any lot is
    /// open; zero when no lots are open (reduction is then a no-op).
    pub total: Decimal,
}

/// Distribute `premium_amount` across open long lots proportionally to
/// each lot's remaining share.
///
/// Largest-remainder pattern: every lot except the last gets its rounded
/// proportional share; the last gets `premium_amount - distributed`, so
/// the total matches the input exactly with no rounding leakage. Negative
/// amounts reverse a prior reduction symmetrically.
pub fn plan_reduce_basis(lots: &[StockLot], premium_amount: Decimal) -> ReductionPlan {
    let mut open: Vec<&StockLot> = lots.iter().filter(|l| l.remaining.is_positive()).collect();
    open.sort_by_key(|l| (l.acquired_at, l.id));

    if open.is_empty() || premium_amount.is_zero() {
        return ReductionPlan::default();
    }

    let total_remaining: Decimal = open.iter().map(|l| l.remaining).sum();
    let mut reductions = Vec::with_capacity(open.len());
    let mut distributed = Decimal::zero();

    for (i, lot) in open.iter().enumerate() {
        let amount = if i == open.len() - 1 {
            premium_amount - distributed
        } else {
            (premium_amount * lot.remaining / total_remaining).round_dp(6)
        };
        distributed = distributed + amount;
        reductions.push(LotReduction {
            lot_id: lot.id,
            amount,
        });
    }

    ReductionPlan {
        reductions,
        total: distributed,
    }
}
