//! Strategy instances: one open-or-closed options position.

use crate::domain::{Decimal, PremiumPolicy, TimeMs};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallPut {
    Call,
    Put,
}

impl CallPut {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallPut::Call => "CALL",
            CallPut::Put => "PUT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "CALL" | "C" => Some(CallPut::Call),
            "PUT" | "P" => Some(CallPut::Put),
            _ => None,
        }
    }
}

/// Option trade actions accepted at the entry surface.
///
/// STO/BTO open a new instance; the rest finalize the matching open one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptionAction {
    Sto,
    Bto,
    Btc,
    Stc,
    Expire,
    Assign,
    Exercise,
}

impl OptionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionAction::Sto => "STO",
            OptionAction::Bto => "BTO",
            OptionAction::Btc => "BTC",
            OptionAction::Stc => "STC",
            OptionAction::Expire => "EXPIRE",
            OptionAction::Assign => "ASSIGN",
            OptionAction::Exercise => "EXERCISE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "STO" => Some(OptionAction::Sto),
            "BTO" => Some(OptionAction::Bto),
            "BTC" => Some(OptionAction::Btc),
            "STC" => Some(OptionAction::Stc),
            "EXPIRE" => Some(OptionAction::Expire),
            "ASSIGN" => Some(OptionAction::Assign),
            "EXERCISE" => Some(OptionAction::Exercise),
            _ => None,
        }
    }

    /// True for the actions that create a new OPEN instance.
    pub fn is_opening(&self) -> bool {
        matches!(self, OptionAction::Sto | OptionAction::Bto)
    }

    /// Finalization reason a closing action maps to; None for openers.
    pub fn finalization_reason(&self) -> Option<FinalizationReason> {
        match self {
            OptionAction::Btc | OptionAction::Stc => Some(FinalizationReason::Closed),
            OptionAction::Expire => Some(FinalizationReason::Expired),
            OptionAction::Assign => Some(FinalizationReason::Assigned),
            OptionAction::Exercise => Some(FinalizationReason::Exercised),
            OptionAction::Sto | OptionAction::Bto => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Open,
    Finalized,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Open => "OPEN",
            InstanceStatus::Finalized => "FINALIZED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(InstanceStatus::Open),
            "FINALIZED" => Some(InstanceStatus::Finalized),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalizationReason {
    Closed,
    Expired,
    Assigned,
    Exercised,
}

impl FinalizationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalizationReason::Closed => "CLOSED",
            FinalizationReason::Expired => "EXPIRED",
            FinalizationReason::Assigned => "ASSIGNED",
            FinalizationReason::Exercised => "EXERCISED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CLOSED" => Some(FinalizationReason::Closed),
            "EXPIRED" => Some(FinalizationReason::Expired),
            "ASSIGNED" => Some(FinalizationReason::Assigned),
            "EXERCISED" => Some(FinalizationReason::Exercised),
            _ => None,
        }
    }
}

/// One option position, OPEN until finalized exactly once.
///
/// `applied_policy` records the policy the finalize call actually ran so a
/// later reopen reverses the same side effect even if overrides changed in
/// the meantime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyInstance {
    pub id: i64,
    pub account_id: i64,
    pub underlying_id: i64,
    /// Action that opened the instance (STO or BTO).
    pub side: OptionAction,
    pub call_put: CallPut,
    pub strike: Decimal,
    pub expiration: NaiveDate,
    pub quantity: Decimal,
    pub status: InstanceStatus,
    pub finalization_reason: Option<FinalizationReason>,
    pub finalized_at: Option<TimeMs>,
    /// Net realized option profit; None until finalized.
    pub realized_option_profit: Option<Decimal>,
    pub premium_policy_override: Option<PremiumPolicy>,
    pub applied_policy: Option<PremiumPolicy>,
    pub opened_at: TimeMs,
}

impl StrategyInstance {
    pub fn is_open(&self) -> bool {
        self.status == InstanceStatus::Open
    }
}
