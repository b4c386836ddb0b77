pub mod accounts;
pub mod health;
pub mod imports;
pub mod portfolio;
pub mod reconcile;
pub mod signals;
pub mod statement;
pub mod trades;
pub mod underlyings;
pub mod wheel;

use crate::config::Config;
use crate::db::Repository;
use crate::domain::TimeMs;
use crate::error::AppError;
use crate::service::{ImportService, InstanceService, SignalService, TradeService};
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub trades: TradeService,
    pub instances: InstanceService,
    pub signals: SignalService,
    pub imports: ImportService,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config) -> Self {
        Self {
            trades: TradeService::new(repo.clone(), config.clone()),
            instances: InstanceService::new(repo.clone()),
            signals: SignalService::new(repo.clone()),
            imports: ImportService::new(repo.clone(), config.clone()),
            repo,
            config,
        }
    }
}

/// Parse an optional RFC3339 timestamp, defaulting to now.
pub(crate) fn parse_occurred_at(value: Option<&str>) -> Result<TimeMs, AppError> {
    match value {
        None => Ok(TimeMs::now()),
        Some(raw) => chrono::DateTime::parse_from_rfc3339(raw)
            .map(|dt| TimeMs::new(dt.timestamp_millis()))
            .map_err(|e| AppError::Validation(format!("occurredAt '{raw}': {e}"))),
    }
}

pub(crate) fn parse_decimal(field: &str, value: &str) -> Result<crate::domain::Decimal, AppError> {
    crate::domain::Decimal::from_str_canonical(value)
        .map_err(|_| AppError::Validation(format!("Invalid {field}: '{value}'")))
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/accounts", post(accounts::create_account))
        .route("/v1/accounts/:id", get(accounts::get_account))
        .route(
            "/v1/accounts/:id/onboarding-complete",
            post(accounts::complete_onboarding),
        )
        .route("/v1/accounts/:id/deposits", post(accounts::create_deposit))
        .route("/v1/accounts/:id/trades/stock", post(trades::create_stock_trade))
        .route(
            "/v1/accounts/:id/trades/option",
            post(trades::create_option_trade),
        )
        .route("/v1/accounts/:id/instances", get(trades::list_instances))
        .route("/v1/instances/:id/reopen", post(trades::reopen_instance))
        .route("/v1/accounts/:id/statement", get(statement::get_statement))
        .route("/v1/accounts/:id/portfolio", get(portfolio::get_portfolio))
        .route("/v1/accounts/:id/signals", get(signals::list_signals))
        .route("/v1/signals/:id/action", post(signals::act_on_signal))
        .route(
            "/v1/accounts/:id/wheel/targets",
            get(wheel::get_targets).put(wheel::put_targets),
        )
        .route(
            "/v1/accounts/:id/wheel/allocation",
            get(wheel::get_allocation),
        )
        .route(
            "/v1/accounts/:id/imports",
            post(imports::preview_import).get(imports::list_imports),
        )
        .route("/v1/imports/:id/commit", post(imports::commit_import))
        .route("/v1/accounts/:id/reconcile", post(reconcile::run_reconcile))
        .route(
            "/v1/accounts/:id/underlyings",
            get(underlyings::list_underlyings),
        )
        .route(
            "/v1/underlyings/:id",
            put(underlyings::update_underlying),
        )
        .layer(cors)
        .with_state(state)
}
