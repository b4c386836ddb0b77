//! Transactional services composing the engines with the repository.

pub mod imports;
pub mod instances;
pub mod signals;
pub mod trades;

pub use imports::{ImportPreview, ImportService, ImportSummary};
pub use instances::{finalize_instance_tx, FinalizeOutcome, InstanceService};
pub use signals::SignalService;
pub use trades::{
    apply_option_trade_tx, apply_stock_trade_tx, OptionTradeInput, OptionTradeOutcome,
    Provenance, StockTradeInput, StockTradeOutcome, TradeService, CONTRACT_MULTIPLIER,
};
