//! Accounts and underlyings.

use crate::domain::{Decimal, PremiumPolicy, Symbol, WheelCategory};
use serde::{Deserialize, Serialize};

/// Owner of all other entities, plus the two cash figures.
///
/// While `onboarding_complete` is false, historical data entry must not
/// perturb cash; the flag is read once per transaction and threaded
/// through (never consulted mid-write).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub free_cash: Decimal,
    pub cashflow_reserve: Decimal,
    pub onboarding_complete: bool,
    pub premium_policy_default: Option<PremiumPolicy>,
}

/// A tradable symbol scoped to one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Underlying {
    pub id: i64,
    pub account_id: i64,
    pub symbol: Symbol,
    pub premium_policy_override: Option<PremiumPolicy>,
    /// None means CORE for allocation purposes.
    pub wheel_category: Option<WheelCategory>,
    /// Manually or externally refreshed; None until first set.
    pub current_price: Option<Decimal>,
}

impl Underlying {
    /// Effective wheel classification (unclassified defaults to CORE).
    pub fn effective_category(&self) -> WheelCategory {
        self.wheel_category.unwrap_or(WheelCategory::Core)
    }
}
