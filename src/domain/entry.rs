//! Ledger entries: signed monetary facts, the journal of record.

use crate::domain::{Decimal, TimeMs};
use serde::{Deserialize, Serialize};

/// Entry classification. Amounts are stored signed: cash inflows positive
/// (STOCK_SELL, PREMIUM_CREDIT, CASH_DEPOSIT), outflows negative
/// (STOCK_BUY, PREMIUM_DEBIT, FEE). ADJUSTMENT carries whatever sign the
/// correction requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    StockBuy,
    StockSell,
    PremiumCredit,
    PremiumDebit,
    Fee,
    Adjustment,
    CashDeposit,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::StockBuy => "STOCK_BUY",
            EntryKind::StockSell => "STOCK_SELL",
            EntryKind::PremiumCredit => "PREMIUM_CREDIT",
            EntryKind::PremiumDebit => "PREMIUM_DEBIT",
            EntryKind::Fee => "FEE",
            EntryKind::Adjustment => "ADJUSTMENT",
            EntryKind::CashDeposit => "CASH_DEPOSIT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "STOCK_BUY" => Some(EntryKind::StockBuy),
            "STOCK_SELL" => Some(EntryKind::StockSell),
            "PREMIUM_CREDIT" => Some(EntryKind::PremiumCredit),
            "PREMIUM_DEBIT" => Some(EntryKind::PremiumDebit),
            "FEE" => Some(EntryKind::Fee),
            "ADJUSTMENT" => Some(EntryKind::Adjustment),
            "CASH_DEPOSIT" => Some(EntryKind::CashDeposit),
            _ => None,
        }
    }

    /// True for the kinds that feed net realized option profit.
    pub fn counts_toward_nrop(&self) -> bool {
        matches!(
            self,
            EntryKind::PremiumCredit | EntryKind::PremiumDebit | EntryKind::Fee
        )
    }
}

/// An immutable-by-default signed monetary fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: i64,
    pub account_id: i64,
    pub underlying_id: Option<i64>,
    pub kind: EntryKind,
    /// Signed amount; see [`EntryKind`] for sign conventions.
    pub amount: Decimal,
    pub occurred_at: TimeMs,
    /// Link to the strategy instance this entry belongs to, if any.
    pub instance_id: Option<i64>,
    /// Caller-supplied external trade id (import provenance).
    pub external_ref: Option<String>,
    /// Normalized content fingerprint (import provenance).
    pub fingerprint: Option<String>,
    pub description: Option<String>,
    /// Set on entries written by a finalize call; reopen deletes these.
    pub is_closing: bool,
}
