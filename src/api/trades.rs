use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::api::{parse_decimal, parse_occurred_at, AppState};
use crate::domain::{
    CallPut, Decimal, InstanceStatus, OptionAction, PremiumPolicy, StockAction,
    StrategyInstance, Symbol, WheelCategory,
};
use crate::error::AppError;
use crate::service::{OptionTradeInput, OptionTradeOutcome, StockTradeInput, StockTradeOutcome};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockTradeRequest {
    pub symbol: String,
    pub action: String,
    pub quantity: String,
    pub price: String,
    pub fees: Option<String>,
    pub occurred_at: Option<String>,
}

fn parse_fees(fees: Option<&str>) -> Result<Decimal, AppError> {
    fees.map(|f| parse_decimal("fees", f))
        .transpose()
        .map(|f| f.unwrap_or_else(Decimal::zero))
}

pub async fn create_stock_trade(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<StockTradeRequest>,
) -> Result<(StatusCode, Json<StockTradeOutcome>), AppError> {
    let action = StockAction::parse(&req.action)
        .ok_or_else(|| AppError::Validation(format!("Unknown stock action '{}'", req.action)))?;
    let input = StockTradeInput {
        symbol: Symbol::new(&req.symbol),
        action,
        quantity: parse_decimal("quantity", &req.quantity)?,
        price: parse_decimal("price", &req.price)?,
        fees: parse_fees(req.fees.as_deref())?,
        occurred_at: parse_occurred_at(req.occurred_at.as_deref())?,
    };
    let outcome = state.trades.record_stock_trade(id, input).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionTradeRequest {
    pub symbol: String,
    pub action: String,
    pub call_put: String,
    pub strike: String,
    /// YYYY-MM-DD.
    pub expiration: String,
    pub quantity: String,
    pub price: String,
    pub fees: Option<String>,
    pub occurred_at: Option<String>,
    pub premium_policy_override: Option<String>,
    pub wheel_category_override: Option<String>,
}

pub async fn create_option_trade(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<OptionTradeRequest>,
) -> Result<(StatusCode, Json<OptionTradeOutcome>), AppError> {
    let action = OptionAction::parse(&req.action)
        .ok_or_else(|| AppError::Validation(format!("Unknown option action '{}'", req.action)))?;
    let call_put = CallPut::parse(&req.call_put)
        .ok_or_else(|| AppError::Validation(format!("Unknown callPut '{}'", req.call_put)))?;
    let expiration = NaiveDate::parse_from_str(req.expiration.trim(), "%Y-%m-%d")
        .map_err(|e| AppError::Validation(format!("expiration '{}': {e}", req.expiration)))?;
    let premium_policy_override = req
        .premium_policy_override
        .as_deref()
        .map(|p| {
            PremiumPolicy::parse(p)
                .ok_or_else(|| AppError::Validation(format!("Unknown premium policy '{p}'")))
        })
        .transpose()?;
    let wheel_category_override = req
        .wheel_category_override
        .as_deref()
        .map(|c| {
            WheelCategory::parse(c)
                .ok_or_else(|| AppError::Validation(format!("Unknown wheel category '{c}'")))
        })
        .transpose()?;

    let input = OptionTradeInput {
        symbol: Symbol::new(&req.symbol),
        action,
        call_put,
        strike: parse_decimal("strike", &req.strike)?,
        expiration,
        quantity: parse_decimal("quantity", &req.quantity)?,
        price: parse_decimal("price", &req.price)?,
        fees: parse_fees(req.fees.as_deref())?,
        occurred_at: parse_occurred_at(req.occurred_at.as_deref())?,
        premium_policy_override,
        wheel_category_override,
    };
    let outcome = state.trades.record_option_trade(id, input).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceQuery {
    pub status: Option<String>,
}

pub async fn list_instances(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<InstanceQuery>,
) -> Result<Json<Vec<StrategyInstance>>, AppError> {
    let status = params
        .status
        .as_deref()
        .map(|s| {
            InstanceStatus::parse(&s.to_uppercase())
                .ok_or_else(|| AppError::Validation(format!("Unknown status '{s}'")))
        })
        .transpose()?;
    Ok(Json(state.repo.list_instances(id, status).await?))
}

pub async fn reopen_instance(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<StrategyInstance>, AppError> {
    Ok(Json(state.instances.reopen(id).await?))
}
