//! Wealth-wheel categories and per-account targets.

use crate::domain::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// The four fixed allocation categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WheelCategory {
    Core,
    MadMoney,
    FreeCapital,
    RiskMgmt,
}

impl WheelCategory {
    pub const ALL: [WheelCategory; 4] = [
        WheelCategory::Core,
        WheelCategory::MadMoney,
        WheelCategory::FreeCapital,
        WheelCategory::RiskMgmt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WheelCategory::Core => "CORE",
            WheelCategory::MadMoney => "MAD_MONEY",
            WheelCategory::FreeCapital => "FREE_CAPITAL",
            WheelCategory::RiskMgmt => "RISK_MGMT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "CORE" => Some(WheelCategory::Core),
            "MAD_MONEY" => Some(WheelCategory::MadMoney),
            "FREE_CAPITAL" => Some(WheelCategory::FreeCapital),
            "RISK_MGMT" => Some(WheelCategory::RiskMgmt),
            _ => None,
        }
    }
}

/// A per-account target percentage for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WheelTarget {
    pub category: WheelCategory,
    pub target_pct: Decimal,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("targets must sum to 100 (+/-0.01), got {0}")]
    BadSum(Decimal),
    #[error("duplicate category {0}")]
    DuplicateCategory(&'static str),
    #[error("negative target for {0}")]
    NegativeTarget(&'static str),
}

/// Validate a full target set: no duplicates, no negatives, sum within
/// 0.01 of 100.
pub fn validate_targets(targets: &[WheelTarget]) -> Result<(), TargetError> {
    let mut seen: Vec<WheelCategory> = Vec::new();
    let mut sum = Decimal::zero();

    for t in targets {
        if seen.contains(&t.category) {
            return Err(TargetError::DuplicateCategory(t.category.as_str()));
        }
        if t.target_pct.is_negative() {
            return Err(TargetError::NegativeTarget(t.category.as_str()));
        }
        seen.push(t.category);
        sum = sum + t.target_pct;
    }

    let tolerance = Decimal::from_str("0.01").expect("static decimal");
    if (sum - Decimal::hundred()).abs() > tolerance {
        return Err(TargetError::BadSum(sum));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(category: WheelCategory, pct: &str) -> WheelTarget {
        WheelTarget {
            category,
            target_pct: Decimal::from_str(pct).unwrap(),
        }
    }

    #[test]
    fn test_sum_99_rejected() {
        let targets = [
            target(WheelCategory::Core, "40"),
            target(WheelCategory::MadMoney, "30"),
            target(WheelCategory::FreeCapital, "20"),
            target(WheelCategory::RiskMgmt, "9"),
        ];
        assert!(matches!(
            validate_targets(&targets),
            Err(TargetError::BadSum(_))
        ));
    }

    #[test]
    fn test_sum_100_accepted() {
        let targets = [
            target(WheelCategory::Core, "40"),
            target(WheelCategory::MadMoney, "30"),
            target(WheelCategory::FreeCapital, "20"),
            target(WheelCategory::RiskMgmt, "10"),
        ];
        assert_eq!(validate_targets(&targets), Ok(()));
    }

    #[test]
    fn test_sum_within_tolerance_accepted() {
        let targets = [
            target(WheelCategory::Core, "40.005"),
            target(WheelCategory::MadMoney, "30"),
            target(WheelCategory::FreeCapital, "20"),
            target(WheelCategory::RiskMgmt, "10"),
        ];
        assert_eq!(validate_targets(&targets), Ok(()));
    }

    #[test]
    fn test_duplicate_category_rejected() {
        let targets = [
            target(WheelCategory::Core, "50"),
            target(WheelCategory::Core, "50"),
        ];
        assert!(matches!(
            validate_targets(&targets),
            Err(TargetError::DuplicateCategory(_))
        ));
    }

    #[test]
    fn test_negative_target_rejected() {
        let targets = [
            target(WheelCategory::Core, "110"),
            target(WheelCategory::MadMoney, "-10"),
        ];
        assert!(matches!(
            validate_targets(&targets),
            Err(TargetError::NegativeTarget(_))
        ));
    }
}
