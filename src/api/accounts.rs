use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::{parse_decimal, parse_occurred_at, AppState};
use crate::domain::{Account, PremiumPolicy};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    pub name: String,
    pub premium_policy_default: Option<String>,
}

fn parse_policy(value: &str) -> Result<PremiumPolicy, AppError> {
    PremiumPolicy::parse(value)
        .ok_or_else(|| AppError::Validation(format!("Unknown premium policy '{value}'")))
}

pub async fn create_account(
    State(state): State<AppState>,
    Json(req): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<Account>), AppError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name must not be empty".to_string()));
    }
    if state.repo.get_account_by_name(name).await?.is_some() {
        return Err(AppError::StateConflict(format!(
            "account '{name}' already exists"
        )));
    }

    let policy = req
        .premium_policy_default
        .as_deref()
        .map(parse_policy)
        .transpose()?;
    let account = state.repo.create_account(name, policy).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Account>, AppError> {
    let account = state
        .repo
        .get_account(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("account {id}")))?;
    Ok(Json(account))
}

/// Flip the onboarding flag. From this point on, trade entry mirrors
/// ledger amounts into free cash.
pub async fn complete_onboarding(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Account>, AppError> {
    if !state.repo.set_onboarding_complete(id).await? {
        return Err(AppError::NotFound(format!("account {id}")));
    }
    let account = state
        .repo
        .get_account(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("account {id}")))?;
    Ok(Json(account))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    pub amount: String,
    pub occurred_at: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositResponse {
    pub entry_id: i64,
}

pub async fn create_deposit(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<DepositRequest>,
) -> Result<(StatusCode, Json<DepositResponse>), AppError> {
    let amount = parse_decimal("amount", &req.amount)?;
    let occurred_at = parse_occurred_at(req.occurred_at.as_deref())?;
    let entry_id = state
        .trades
        .record_deposit(id, amount, occurred_at, req.description)
        .await?;
    Ok((StatusCode::CREATED, Json(DepositResponse { entry_id })))
}
