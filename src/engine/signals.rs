//! Reinvest signal state transitions.

use crate::domain::{Decimal, ReinvestSignal, SignalAction, SignalStatus, TimeMs};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignalError {
    #[error("signal is already {0}")]
    AlreadyTerminal(&'static str),
    #[error("CONFIRM_PARTIAL requires a positive partial amount")]
    MissingPartialAmount,
    #[error("partial amount {partial} exceeds signal amount {amount}")]
    PartialExceedsAmount { partial: Decimal, amount: Decimal },
}

/// Field updates produced by a user action on a signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalUpdate {
    pub status: SignalStatus,
    pub completed_amount: Option<Decimal>,
    /// Every transition stamps acknowledgement time.
    pub acknowledged_at: TimeMs,
}

/// Apply a user action to a signal, returning the resulting field updates.
///
/// Terminal signals reject all further actions. SNOOZE leaves `due_at`
/// unchanged and may be repeated.
pub fn apply_action(
    signal: &ReinvestSignal,
    action: SignalAction,
    partial_amount: Option<Decimal>,
    now: TimeMs,
) -> Result<SignalUpdate, SignalError> {
    if signal.status.is_terminal() {
        return Err(SignalError::AlreadyTerminal(signal.status.as_str()));
    }

    let (status, completed_amount) = match action {
        SignalAction::ConfirmFull => (SignalStatus::Completed, Some(signal.amount)),
        SignalAction::ConfirmPartial => {
            let partial = partial_amount.ok_or(SignalError::MissingPartialAmount)?;
            if !partial.is_positive() {
                return Err(SignalError::MissingPartialAmount);
            }
            if partial > signal.amount {
                return Err(SignalError::PartialExceedsAmount {
                    partial,
                    amount: signal.amount,
                });
            }
            (SignalStatus::PartialCompleted, Some(partial))
        }
        SignalAction::Snooze => (SignalStatus::Snoozed, None),
        SignalAction::Skip => (SignalStatus::Skipped, None),
    };

    Ok(SignalUpdate {
        status,
        completed_amount,
        acknowledged_at: now,
    })
}

/// Sum of pending signals whose due time has passed. Read-only aggregate,
/// never stored.
pub fn reinvest_ready_total(signals: &[ReinvestSignal], now: TimeMs) -> Decimal {
    signals
        .iter()
        .filter(|s| s.status.is_pending() && s.due_at <= now)
        .map(|s| s.amount)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn signal(status: SignalStatus, amount: &str, due_at: i64) -> ReinvestSignal {
        ReinvestSignal {
            id: 1,
            account_id: 1,
            underlying_id: 1,
            instance_id: 1,
            amount: dec(amount),
            status,
            due_at: TimeMs::new(due_at),
            acknowledged_at: None,
            completed_amount: None,
        }
    }

    #[test]
    fn test_confirm_full_completes_with_full_amount() {
        let s = signal(SignalStatus::Created, "100", 0);
        let update = apply_action(&s, SignalAction::ConfirmFull, None, TimeMs::new(500)).unwrap();
        assert_eq!(update.status, SignalStatus::Completed);
        assert_eq!(update.completed_amount, Some(dec("100")));
        assert_eq!(update.acknowledged_at, TimeMs::new(500));
    }

    #[test]
    fn test_confirm_partial_requires_positive_amount() {
        let s = signal(SignalStatus::Notified, "100", 0);
        assert_eq!(
            apply_action(&s, SignalAction::ConfirmPartial, None, TimeMs::new(0)),
            Err(SignalError::MissingPartialAmount)
        );
        assert_eq!(
            apply_action(
                &s,
                SignalAction::ConfirmPartial,
                Some(Decimal::zero()),
                TimeMs::new(0)
            ),
            Err(SignalError::MissingPartialAmount)
        );

        let update =
            apply_action(&s, SignalAction::ConfirmPartial, Some(dec("40")), TimeMs::new(0))
                .unwrap();
        assert_eq!(update.status, SignalStatus::PartialCompleted);
        assert_eq!(update.completed_amount, Some(dec("40")));
    }

    #[test]
    fn test_confirm_partial_cannot_exceed_amount() {
        let s = signal(SignalStatus::Created, "100", 0);
        assert_eq!(
            apply_action(&s, SignalAction::ConfirmPartial, Some(dec("150")), TimeMs::new(0)),
            Err(SignalError::PartialExceedsAmount {
                partial: dec("150"),
                amount: dec("100"),
            })
        );
    }

    #[test]
    fn test_snooze_is_repeatable_and_keeps_due_at() {
        let s = signal(SignalStatus::Created, "100", 777);
        let update = apply_action(&s, SignalAction::Snooze, None, TimeMs::new(10)).unwrap();
        assert_eq!(update.status, SignalStatus::Snoozed);
        assert_eq!(update.completed_amount, None);

        // Snoozing an already snoozed signal is allowed.
        let snoozed = ReinvestSignal {
            status: SignalStatus::Snoozed,
            ..s
        };
        let again = apply_action(&snoozed, SignalAction::Snooze, None, TimeMs::new(20)).unwrap();
        assert_eq!(again.status, SignalStatus::Snoozed);
    }

    #[test]
    fn test_terminal_signal_rejects_actions() {
        for status in [
            SignalStatus::Completed,
            SignalStatus::PartialCompleted,
            SignalStatus::Skipped,
        ] {
            let s = signal(status, "100", 0);
            assert!(matches!(
                apply_action(&s, SignalAction::Snooze, None, TimeMs::new(0)),
                Err(SignalError::AlreadyTerminal(_))
            ));
        }
    }

    #[test]
    fn test_reinvest_ready_total_counts_due_pending_only() {
        let signals = vec![
            signal(SignalStatus::Created, "100", 1000),  // due
            signal(SignalStatus::Notified, "50", 2000),  // due
            signal(SignalStatus::Created, "25", 9000),   // not yet due
            signal(SignalStatus::Snoozed, "75", 1000),   // not pending
            signal(SignalStatus::Completed, "60", 1000), // terminal
        ];
        assert_eq!(reinvest_ready_total(&signals, TimeMs::new(2000)), dec("150"));
    }
}
