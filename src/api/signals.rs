use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::{parse_decimal, AppState};
use crate::domain::{Decimal, ReinvestSignal, SignalAction, SignalStatus, TimeMs};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct SignalListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalListResponse {
    /// Total profit in pending signals whose grace period has elapsed.
    pub ready_total: Decimal,
    pub signals: Vec<ReinvestSignal>,
}

pub async fn list_signals(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<SignalListQuery>,
) -> Result<Json<SignalListResponse>, AppError> {
    if state.repo.get_account(id).await?.is_none() {
        return Err(AppError::NotFound(format!("account {id}")));
    }

    let status = match params.status.as_deref() {
        None => None,
        Some(raw) => Some(
            SignalStatus::parse(raw)
                .ok_or_else(|| AppError::Validation(format!("Unknown signal status '{raw}'")))?,
        ),
    };

    let signals = state.signals.list(id, status).await?;
    let ready_total = state.signals.ready_total(id, TimeMs::now()).await?;
    Ok(Json(SignalListResponse {
        ready_total,
        signals,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalActionRequest {
    pub action: String,
    /// Required for CONFIRM_PARTIAL, rejected otherwise.
    pub partial_amount: Option<String>,
}

pub async fn act_on_signal(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<SignalActionRequest>,
) -> Result<Json<ReinvestSignal>, AppError> {
    let action = SignalAction::parse(&req.action)
        .ok_or_else(|| AppError::Validation(format!("Unknown signal action '{}'", req.action)))?;
    let partial_amount = req
        .partial_amount
        .as_deref()
        .map(|raw| parse_decimal("partialAmount", raw))
        .transpose()?;

    let signal = state.signals.act(id, action, partial_amount).await?;
    Ok(Json(signal))
}
