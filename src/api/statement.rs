use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::{Decimal, LedgerEntry, TimeMs};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementQuery {
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementResponse {
    pub free_cash: Decimal,
    pub cashflow_reserve: Decimal,
    pub entries: Vec<LedgerEntry>,
}

/// Ledger entries newest first, with the account's derived cash figures.
pub async fn get_statement(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<StatementQuery>,
) -> Result<Json<StatementResponse>, AppError> {
    let account = state
        .repo
        .get_account(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("account {id}")))?;

    let from = params.from_ms.map(TimeMs::new);
    let to = params.to_ms.map(TimeMs::new);
    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(AppError::Validation("fromMs must be <= toMs".to_string()));
        }
    }

    let entries = state.repo.list_entries(id, from, to).await?;
    Ok(Json(StatementResponse {
        free_cash: account.free_cash,
        cashflow_reserve: account.cashflow_reserve,
        entries,
    }))
}
