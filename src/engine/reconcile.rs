//! Reconciliation: detect and repair drift between stored totals and the
//! ledger they were derived from.
//!
//! All repairs are idempotent. Running reconcile twice in a row yields an
//! empty second report.

use crate::db::repo::{signals::upsert_signal_tx, Repository};
use crate::domain::{Decimal, InstanceStatus, PremiumPolicy};
use crate::engine::finalizer::compute_nrop;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepairKind {
    NropRewritten,
    NropBackfilled,
    SignalCreated,
    OrphanFieldsCleared,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Repair {
    pub kind: RepairKind,
    pub instance_id: i64,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub checked_instances: usize,
    pub repairs: Vec<Repair>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.repairs.is_empty()
    }
}

/// Walks an account's instances and repairs derived state against the
/// ledger source of truth.
pub struct Reconciler<'a> {
    repo: &'a Repository,
    grace_hours: i64,
}

impl<'a> Reconciler<'a> {
    pub fn new(repo: &'a Repository, grace_hours: i64) -> Self {
        Reconciler { repo, grace_hours }
    }

    pub async fn run(&self, account_id: i64) -> Result<ReconcileReport, sqlx::Error> {
        let mut report = ReconcileReport::default();

        let finalized = self
            .repo
            .list_instances(account_id, Some(InstanceStatus::Finalized))
            .await?;
        for instance in &finalized {
            report.checked_instances += 1;

            let entries = self.repo.list_entries_for_instance(instance.id).await?;
            let expected = compute_nrop(&entries);

            match instance.realized_option_profit {
                Some(stored) if stored == expected => {}
                Some(stored) => {
                    self.repo.update_instance_nrop(instance.id, expected).await?;
                    info!(
                        instance_id = instance.id,
                        stored = %stored,
                        expected = %expected,
                        "Reconcile: rewrote drifted realized option profit"
                    );
                    report.repairs.push(Repair {
                        kind: RepairKind::NropRewritten,
                        instance_id: instance.id,
                        detail: format!("stored {stored}, ledger says {expected}"),
                    });
                }
                None => {
                    self.repo.update_instance_nrop(instance.id, expected).await?;
                    info!(
                        instance_id = instance.id,
                        expected = %expected,
                        "Reconcile: backfilled missing realized option profit"
                    );
                    report.repairs.push(Repair {
                        kind: RepairKind::NropBackfilled,
                        instance_id: instance.id,
                        detail: format!("backfilled from ledger: {expected}"),
                    });
                }
            }

            if let Some(repair) = self.ensure_signal(instance, expected).await? {
                report.repairs.push(repair);
            }
        }

        let open = self
            .repo
            .list_instances(account_id, Some(InstanceStatus::Open))
            .await?;
        for instance in &open {
            report.checked_instances += 1;
            let orphaned = instance.finalization_reason.is_some()
                || instance.finalized_at.is_some()
                || instance.realized_option_profit.is_some()
                || instance.applied_policy.is_some();
            if orphaned {
                self.repo
                    .clear_orphan_finalization_fields(instance.id)
                    .await?;
                info!(
                    instance_id = instance.id,
                    "Reconcile: cleared finalization fields on open instance"
                );
                report.repairs.push(Repair {
                    kind: RepairKind::OrphanFieldsCleared,
                    instance_id: instance.id,
                    detail: "open instance carried finalization fields".to_string(),
                });
            }
        }

        Ok(report)
    }

    /// A REINVEST_ON_CLOSE finalize with positive profit must have left a
    /// signal behind; recreate it if the row is missing.
    async fn ensure_signal(
        &self,
        instance: &crate::domain::StrategyInstance,
        nrop: Decimal,
    ) -> Result<Option<Repair>, sqlx::Error> {
        if instance.applied_policy != Some(PremiumPolicy::ReinvestOnClose) || !nrop.is_positive() {
            return Ok(None);
        }
        if self.repo.signal_for_instance(instance.id).await?.is_some() {
            return Ok(None);
        }
        let finalized_at = match instance.finalized_at {
            Some(t) => t,
            None => return Ok(None),
        };

        let due_at = finalized_at.plus_hours(self.grace_hours);
        let mut conn = self.repo.pool().acquire().await?;
        upsert_signal_tx(
            &mut conn,
            instance.account_id,
            instance.underlying_id,
            instance.id,
            nrop,
            due_at,
        )
        .await?;
        info!(
            instance_id = instance.id,
            amount = %nrop,
            "Reconcile: recreated missing reinvest signal"
        );
        Ok(Some(Repair {
            kind: RepairKind::SignalCreated,
            instance_id: instance.id,
            detail: format!("recreated signal for {nrop}"),
        }))
    }
}
