use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::api::{parse_decimal, AppState};
use crate::domain::{validate_targets, Decimal, WheelCategory, WheelTarget};
use crate::engine::wheel::{compute_allocation, CategoryAllocation};
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetsResponse {
    pub targets: Vec<WheelTarget>,
}

pub async fn get_targets(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TargetsResponse>, AppError> {
    if state.repo.get_account(id).await?.is_none() {
        return Err(AppError::NotFound(format!("account {id}")));
    }
    let targets = state.repo.get_wheel_targets(id).await?;
    Ok(Json(TargetsResponse { targets }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInput {
    pub category: String,
    pub target_pct: String,
}

#[derive(Debug, Deserialize)]
pub struct PutTargetsRequest {
    pub targets: Vec<TargetInput>,
}

/// Replace the full target set. Rejected unless percentages sum to 100.
pub async fn put_targets(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<PutTargetsRequest>,
) -> Result<Json<TargetsResponse>, AppError> {
    if state.repo.get_account(id).await?.is_none() {
        return Err(AppError::NotFound(format!("account {id}")));
    }

    let mut targets = Vec::with_capacity(req.targets.len());
    for input in &req.targets {
        let category = WheelCategory::parse(&input.category).ok_or_else(|| {
            AppError::Validation(format!("Unknown wheel category '{}'", input.category))
        })?;
        let target_pct = parse_decimal("targetPct", &input.target_pct)?;
        targets.push(WheelTarget {
            category,
            target_pct,
        });
    }
    validate_targets(&targets).map_err(|e| AppError::Validation(e.to_string()))?;

    state.repo.replace_wheel_targets(id, &targets).await?;
    let targets = state.repo.get_wheel_targets(id).await?;
    Ok(Json(TargetsResponse { targets }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationResponse {
    pub grand_total: Decimal,
    pub allocations: Vec<CategoryAllocation>,
}

/// Current wealth breakdown across the four wheel categories.
///
/// Each underlying contributes the adjusted open basis of its open lots to
/// its effective category; free cash lands in FREE_CAPITAL.
pub async fn get_allocation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AllocationResponse>, AppError> {
    let account = state
        .repo
        .get_account(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("account {id}")))?;

    let category_of: HashMap<i64, WheelCategory> = state
        .repo
        .list_underlyings(id)
        .await?
        .into_iter()
        .map(|u| (u.id, u.effective_category()))
        .collect();

    let mut basis_by_category = Vec::new();
    for lot in state.repo.list_open_lots(id).await? {
        if let Some(category) = category_of.get(&lot.underlying_id) {
            basis_by_category.push((*category, lot.adjusted_open_basis()));
        }
    }

    let targets = state.repo.get_wheel_targets(id).await?;
    let allocations = compute_allocation(&basis_by_category, account.free_cash, &targets);
    let grand_total: Decimal = allocations.iter().map(|a| a.total).sum();

    Ok(Json(AllocationResponse {
        grand_total,
        allocations,
    }))
}
