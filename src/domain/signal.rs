//! Reinvest signals: "you have profit to redeploy" alerts.

use crate::domain::{Decimal, TimeMs};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalStatus {
    Created,
    Notified,
    Acknowledged,
    Snoozed,
    Completed,
    PartialCompleted,
    Skipped,
}

impl SignalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStatus::Created => "CREATED",
            SignalStatus::Notified => "NOTIFIED",
            SignalStatus::Acknowledged => "ACKNOWLEDGED",
            SignalStatus::Snoozed => "SNOOZED",
            SignalStatus::Completed => "COMPLETED",
            SignalStatus::PartialCompleted => "PARTIAL_COMPLETED",
            SignalStatus::Skipped => "SKIPPED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATED" => Some(SignalStatus::Created),
            "NOTIFIED" => Some(SignalStatus::Notified),
            "ACKNOWLEDGED" => Some(SignalStatus::Acknowledged),
            "SNOOZED" => Some(SignalStatus::Snoozed),
            "COMPLETED" => Some(SignalStatus::Completed),
            "PARTIAL_COMPLETED" => Some(SignalStatus::PartialCompleted),
            "SKIPPED" => Some(SignalStatus::Skipped),
            _ => None,
        }
    }

    /// Terminal statuses accept no further user action.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SignalStatus::Completed | SignalStatus::PartialCompleted | SignalStatus::Skipped
        )
    }

    /// Statuses that count toward the reinvest-ready total.
    pub fn is_pending(&self) -> bool {
        matches!(self, SignalStatus::Created | SignalStatus::Notified)
    }
}

/// User actions on a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalAction {
    ConfirmFull,
    ConfirmPartial,
    Snooze,
    Skip,
}

impl SignalAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "CONFIRM_FULL" => Some(SignalAction::ConfirmFull),
            "CONFIRM_PARTIAL" => Some(SignalAction::ConfirmPartial),
            "SNOOZE" => Some(SignalAction::Snooze),
            "SKIP" => Some(SignalAction::Skip),
            _ => None,
        }
    }
}

/// At most one signal exists per instance (upsert keyed by instance_id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReinvestSignal {
    pub id: i64,
    pub account_id: i64,
    pub underlying_id: i64,
    pub instance_id: i64,
    pub amount: Decimal,
    pub status: SignalStatus,
    /// Finalization time plus the grace period.
    pub due_at: TimeMs,
    pub acknowledged_at: Option<TimeMs>,
    pub completed_amount: Option<Decimal>,
}
