//! User actions on reinvest signals.

use crate::db::repo::Repository;
use crate::domain::{Decimal, ReinvestSignal, SignalAction, SignalStatus, TimeMs};
use crate::engine::signals::{apply_action, reinvest_ready_total};
use crate::error::AppError;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct SignalService {
    repo: Arc<Repository>,
}

impl SignalService {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    pub async fn act(
        &self,
        signal_id: i64,
        action: SignalAction,
        partial_amount: Option<Decimal>,
    ) -> Result<ReinvestSignal, AppError> {
        let signal = self
            .repo
            .get_signal(signal_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("signal {signal_id}")))?;

        let update = apply_action(&signal, action, partial_amount, TimeMs::now())?;
        self.repo.apply_signal_update(signal_id, &update).await?;

        info!(
            signal_id,
            status = update.status.as_str(),
            "Applied signal action"
        );

        self.repo
            .get_signal(signal_id)
            .await?
            .ok_or_else(|| AppError::Internal("signal vanished during update".to_string()))
    }

    pub async fn list(
        &self,
        account_id: i64,
        status: Option<SignalStatus>,
    ) -> Result<Vec<ReinvestSignal>, AppError> {
        Ok(self.repo.list_signals(account_id, status).await?)
    }

    /// Total profit sitting in due, unactioned signals.
    pub async fn ready_total(&self, account_id: i64, now: TimeMs) -> Result<Decimal, AppError> {
        let signals = self.repo.list_signals(account_id, None).await?;
        Ok(reinvest_ready_total(&signals, now))
    }
}
