pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod import;
pub mod service;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    Account, CallPut, Decimal, EntryKind, InstanceStatus, LedgerEntry, OptionAction,
    PremiumPolicy, ReinvestSignal, StockAction, StockLot, StrategyInstance, Symbol, TimeMs,
    Underlying, WheelCategory,
};
pub use error::AppError;
