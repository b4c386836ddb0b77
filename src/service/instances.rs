//! Finalize and reopen lifecycle for strategy instances.
//!
//! Finalization runs as part of the closing trade's transaction; reopen is
//! its exact inverse, driven by what the finalize actually recorded
//! (`applied_policy`, the stored NROP, and the closing-marked entries).

use crate::db::repo::instances::{mark_finalized_tx, mark_reopened_tx};
use crate::db::repo::ledger::{delete_closing_entries_tx, entries_for_instance_tx};
use crate::db::repo::lots::{apply_reduction_plan_tx, open_lots_tx};
use crate::db::repo::signals::{delete_live_signal_tx, upsert_signal_tx};
use crate::db::repo::{adjust_cashflow_reserve_tx, adjust_free_cash_tx, Repository};
use crate::domain::{
    resolve_policy, Account, Decimal, FinalizationReason, PremiumPolicy, StrategyInstance,
    TimeMs, Underlying,
};
use crate::engine::finalizer::{compute_nrop, plan_finalize_effect, FinalizeEffect};
use crate::engine::lots::plan_reduce_basis;
use crate::error::AppError;
use sqlx::sqlite::SqliteConnection;
use std::sync::Arc;
use tracing::info;

/// What a finalization computed and applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeOutcome {
    pub nrop: Decimal,
    pub policy: PremiumPolicy,
    pub signal_created: bool,
    pub lots_reduced: usize,
}

/// Finalize an OPEN instance inside the caller's transaction.
///
/// The closing ledger entries must already be written so the NROP
/// computation sees them. Exactly one policy side effect runs, and only
/// when the instance closed at a profit.
pub async fn finalize_instance_tx(
    conn: &mut SqliteConnection,
    account: &Account,
    underlying: &Underlying,
    instance: &StrategyInstance,
    reason: FinalizationReason,
    finalized_at: TimeMs,
    grace_hours: i64,
) -> Result<FinalizeOutcome, AppError> {
    if !instance.is_open() {
        return Err(AppError::StateConflict(format!(
            "instance {} is already finalized",
            instance.id
        )));
    }

    let entries = entries_for_instance_tx(conn, instance.id).await?;
    let nrop = compute_nrop(&entries);
    let policy = resolve_policy(
        instance.premium_policy_override,
        underlying.premium_policy_override,
        account.premium_policy_default,
    );

    let open_lots = open_lots_tx(conn, underlying.id).await?;
    let effect = plan_finalize_effect(policy, nrop, finalized_at, grace_hours, &open_lots);

    // Record the policy only when its side effect actually ran; reopen
    // reverses based on this field and must not undo a no-op.
    let applied = match effect {
        FinalizeEffect::None => None,
        _ => Some(policy),
    };

    let mut signal_created = false;
    let mut lots_reduced = 0;
    match effect {
        FinalizeEffect::CreateSignal { amount, due_at } => {
            upsert_signal_tx(
                conn,
                account.id,
                underlying.id,
                instance.id,
                amount,
                due_at,
            )
            .await?;
            signal_created = true;
        }
        FinalizeEffect::ReduceBasis(plan) => {
            lots_reduced = plan.reductions.len();
            apply_reduction_plan_tx(conn, &plan).await?;
        }
        FinalizeEffect::EarmarkCashflow { amount } => {
            adjust_cashflow_reserve_tx(conn, account.id, amount).await?;
        }
        FinalizeEffect::None => {}
    }

    mark_finalized_tx(conn, instance.id, reason, finalized_at, nrop, applied).await?;

    info!(
        instance_id = instance.id,
        nrop = %nrop,
        policy = policy.as_str(),
        reason = reason.as_str(),
        "Finalized instance"
    );

    Ok(FinalizeOutcome {
        nrop,
        policy,
        signal_created,
        lots_reduced,
    })
}

/// Reopen service over the repository.
#[derive(Clone)]
pub struct InstanceService {
    repo: Arc<Repository>,
}

impl InstanceService {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// Undo a finalization: remove the closing entries, reverse the policy
    /// side effect that ran, reverse the cash movement, and set the
    /// instance back to OPEN.
    pub async fn reopen(&self, instance_id: i64) -> Result<StrategyInstance, AppError> {
        let instance = self
            .repo
            .get_instance(instance_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("instance {instance_id}")))?;
        if instance.is_open() {
            return Err(AppError::StateConflict(format!(
                "instance {instance_id} is not finalized"
            )));
        }

        let nrop = instance.realized_option_profit.unwrap_or_else(Decimal::zero);
        let applied = instance.applied_policy;

        let mut tx = self.repo.pool().begin().await?;
        let account = crate::db::repo::get_account_tx(&mut *tx, instance.account_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {}", instance.account_id)))?;

        let deleted = delete_closing_entries_tx(&mut *tx, instance_id).await?;
        if account.onboarding_complete {
            let reversal: Decimal = deleted.iter().map(|e| e.amount).sum();
            adjust_free_cash_tx(&mut *tx, account.id, -reversal).await?;
        }

        // The side effect only ran for profitable closes.
        if nrop.is_positive() {
            match applied {
                Some(PremiumPolicy::ReinvestOnClose) => {
                    delete_live_signal_tx(&mut *tx, instance_id).await?;
                }
                Some(PremiumPolicy::BasisReduction) => {
                    let open_lots = open_lots_tx(&mut *tx, instance.underlying_id).await?;
                    let plan = plan_reduce_basis(&open_lots, -nrop);
                    apply_reduction_plan_tx(&mut *tx, &plan).await?;
                }
                Some(PremiumPolicy::Cashflow) => {
                    adjust_cashflow_reserve_tx(&mut *tx, account.id, -nrop)
                        .await?;
                }
                None => {}
            }
        }

        mark_reopened_tx(&mut *tx, instance_id).await?;
        tx.commit().await?;

        info!(
            instance_id,
            nrop = %nrop,
            entries_removed = deleted.len(),
            "Reopened instance"
        );

        self.repo
            .get_instance(instance_id)
            .await?
            .ok_or_else(|| AppError::Internal("instance vanished during reopen".to_string()))
    }
}
