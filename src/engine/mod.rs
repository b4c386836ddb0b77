//! Pure computation engines for deterministic ledger logic.

pub mod finalizer;
pub mod lots;
pub mod reconcile;
pub mod signals;
pub mod wheel;

pub use finalizer::{compute_nrop, plan_finalize_effect, FinalizeEffect, DEFAULT_GRACE_HOURS};
pub use lots::{
    plan_acquire, plan_consume, plan_reduce_basis, ConsumePlan, ConsumedPortion, LotError,
    LotReduction, NewLot, OversellMode, ReductionPlan,
};
pub use reconcile::{ReconcileReport, Reconciler, Repair, RepairKind};
pub use signals::{apply_action, reinvest_ready_total, SignalError, SignalUpdate};
pub use wheel::{compute_allocation, CategoryAllocation};
