use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::api::AppState;
use crate::domain::TimeMs;
use crate::error::AppError;
use crate::service::{ImportPreview, ImportSummary};

/// Import history item. The stored file bytes stay server-side.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportListItem {
    pub id: String,
    pub file_hash: String,
    pub row_count: i64,
    pub new_count: i64,
    pub duplicate_count: i64,
    pub created_at: TimeMs,
    pub committed_at: Option<TimeMs>,
}

pub async fn list_imports(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ImportListItem>>, AppError> {
    if state.repo.get_account(id).await?.is_none() {
        return Err(AppError::NotFound(format!("account {id}")));
    }
    let items = state
        .repo
        .list_imports(id)
        .await?
        .into_iter()
        .map(|r| ImportListItem {
            id: r.id,
            file_hash: r.file_hash,
            row_count: r.row_count,
            new_count: r.new_count,
            duplicate_count: r.duplicate_count,
            created_at: r.created_at,
            committed_at: r.committed_at,
        })
        .collect();
    Ok(Json(items))
}

/// Accepts the raw CSV body, evaluates dedup layers, and stores the file.
/// Nothing hits the ledger until commit.
pub async fn preview_import(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<(StatusCode, Json<ImportPreview>), AppError> {
    if body.is_empty() {
        return Err(AppError::Validation("empty import body".to_string()));
    }
    let preview = state.imports.preview(id, body.to_vec()).await?;
    Ok((StatusCode::CREATED, Json(preview)))
}

/// Replays the stored file in one transaction; idempotent on re-commit.
pub async fn commit_import(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ImportSummary>, AppError> {
    let summary = state.imports.commit(&id).await?;
    Ok(Json(summary))
}
