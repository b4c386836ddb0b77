//! Premium-handling policy and its cascading resolution.

use serde::{Deserialize, Serialize};

/// What happens to realized option profit when an instance is finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PremiumPolicy {
    /// Profit is earmarked for redeployment via a reinvest signal.
    ReinvestOnClose,
    /// Profit lowers the cost basis of the underlying's open lots.
    BasisReduction,
    /// Profit simply remains as cash.
    Cashflow,
}

impl PremiumPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PremiumPolicy::ReinvestOnClose => "REINVEST_ON_CLOSE",
            PremiumPolicy::BasisReduction => "BASIS_REDUCTION",
            PremiumPolicy::Cashflow => "CASHFLOW",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "REINVEST_ON_CLOSE" => Some(PremiumPolicy::ReinvestOnClose),
            "BASIS_REDUCTION" => Some(PremiumPolicy::BasisReduction),
            "CASHFLOW" => Some(PremiumPolicy::Cashflow),
            _ => None,
        }
    }
}

/// Resolve the effective premium policy for an instance.
///
/// Cascading lookup, first present value wins, in this fixed order:
/// instance override, underlying override, account default, then the
/// system default (CASHFLOW). Pure function; callers must read the three
/// optionals at one point in time so the cascade never mixes stale and
/// fresh overrides.
pub fn resolve_policy(
    instance_override: Option<PremiumPolicy>,
    underlying_override: Option<PremiumPolicy>,
    account_default: Option<PremiumPolicy>,
) -> PremiumPolicy {
    instance_override
        .or(underlying_override)
        .or(account_default)
        .unwrap_or(PremiumPolicy::Cashflow)
}
