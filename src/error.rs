use crate::engine::lots::LotError;
use crate::engine::signals::SignalError;
use crate::import::{ImportParseError, RowError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("State conflict: {0}")]
    StateConflict(String),
    #[error("Insufficient shares: {0}")]
    InsufficientShares(String),
    #[error("{} import row(s) failed", .0.len())]
    ImportRows(Vec<RowError>),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<LotError> for AppError {
    fn from(err: LotError) -> Self {
        match err {
            LotError::InsufficientShares { .. } => AppError::InsufficientShares(err.to_string()),
            LotError::NonPositiveQuantity(_) => AppError::Validation(err.to_string()),
        }
    }
}

impl From<SignalError> for AppError {
    fn from(err: SignalError) -> Self {
        match err {
            SignalError::AlreadyTerminal(_) => AppError::StateConflict(err.to_string()),
            _ => AppError::Validation(err.to_string()),
        }
    }
}

impl From<ImportParseError> for AppError {
    fn from(err: ImportParseError) -> Self {
        match err {
            ImportParseError::Rows(errors) => AppError::ImportRows(errors),
            ImportParseError::Csv(e) => AppError::Validation(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::ImportRows(errors) = self {
            let body = Json(json!({
                "error": format!("{} import row(s) failed", errors.len()),
                "rowErrors": errors,
            }));
            return (StatusCode::BAD_REQUEST, body).into_response();
        }

        let (status, error_message) = match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::StateConflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::InsufficientShares(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::ImportRows(_) => unreachable!("handled above"),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
