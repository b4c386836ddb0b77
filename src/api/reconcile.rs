use axum::extract::{Path, State};
use axum::Json;

use crate::api::AppState;
use crate::engine::reconcile::{ReconcileReport, Reconciler};
use crate::error::AppError;

/// Detect and repair drift between stored totals and the ledger.
pub async fn run_reconcile(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ReconcileReport>, AppError> {
    if state.repo.get_account(id).await?.is_none() {
        return Err(AppError::NotFound(format!("account {id}")));
    }
    let reconciler = Reconciler::new(&state.repo, state.config.reinvest_grace_hours);
    let report = reconciler.run(id).await?;
    Ok(Json(report))
}
