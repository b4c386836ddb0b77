use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::api::{parse_decimal, AppState};
use crate::db::repo::{set_underlying_category_tx, set_underlying_policy_override_tx};
use crate::domain::{PremiumPolicy, Underlying, WheelCategory};
use crate::error::AppError;

pub async fn list_underlyings(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Underlying>>, AppError> {
    if state.repo.get_account(id).await?.is_none() {
        return Err(AppError::NotFound(format!("account {id}")));
    }
    Ok(Json(state.repo.list_underlyings(id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUnderlyingRequest {
    /// Manually refreshed quote for unrealized P/L and market value.
    pub current_price: Option<String>,
    pub premium_policy_override: Option<String>,
    pub wheel_category: Option<String>,
}

/// Partial update: only the fields present in the body change.
pub async fn update_underlying(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUnderlyingRequest>,
) -> Result<Json<Underlying>, AppError> {
    if state.repo.get_underlying(id).await?.is_none() {
        return Err(AppError::NotFound(format!("underlying {id}")));
    }

    if let Some(raw) = req.current_price.as_deref() {
        let price = parse_decimal("currentPrice", raw)?;
        if price.is_negative() {
            return Err(AppError::Validation(format!(
                "currentPrice must be >= 0, got {price}"
            )));
        }
        state.repo.set_underlying_price(id, price).await?;
    }

    if let Some(raw) = req.premium_policy_override.as_deref() {
        let policy = PremiumPolicy::parse(raw)
            .ok_or_else(|| AppError::Validation(format!("Unknown premium policy '{raw}'")))?;
        let mut conn = state.repo.pool().acquire().await?;
        set_underlying_policy_override_tx(&mut conn, id, policy).await?;
    }

    if let Some(raw) = req.wheel_category.as_deref() {
        let category = WheelCategory::parse(raw)
            .ok_or_else(|| AppError::Validation(format!("Unknown wheel category '{raw}'")))?;
        let mut conn = state.repo.pool().acquire().await?;
        set_underlying_category_tx(&mut conn, id, category).await?;
    }

    state
        .repo
        .get_underlying(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::Internal("underlying vanished during update".to_string()))
}
