//! Domain types and determinism layer for the position & ledger engine.
//!
//! This module provides:
//! - Lossless numeric handling via the Decimal wrapper
//! - Domain primitives: TimeMs, Symbol, StockAction, InstrumentType
//! - Ledger, lot, instance, signal, and wheel entity types
//! - The pure premium-policy cascade

pub mod account;
pub mod decimal;
pub mod entry;
pub mod instance;
pub mod lot;
pub mod policy;
pub mod primitives;
pub mod signal;
pub mod wheel;

pub use account::{Account, Underlying};
pub use decimal::Decimal;
pub use entry::{EntryKind, LedgerEntry};
pub use instance::{
    CallPut, FinalizationReason, InstanceStatus, OptionAction, StrategyInstance,
};
pub use lot::StockLot;
pub use policy::{resolve_policy, PremiumPolicy};
pub use primitives::{InstrumentType, StockAction, Symbol, TimeMs};
pub use signal::{ReinvestSignal, SignalAction, SignalStatus};
pub use wheel::{validate_targets, TargetError, WheelCategory, WheelTarget};
