//! Error taxonomy for the core services, mapped onto HTTP at the boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::normalize::NormalizeError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("invalid number set: {0}")]
    InvalidNumbers(String),

    #[error("device id must not be empty")]
    InvalidDevice,

    #[error("invalid round parameter: {0}")]
    InvalidRound(String),

    #[error("round {0} has not been drawn yet")]
    RoundNotDrawn(u32),

    #[error("no draw result available for round {0}")]
    ResultUnavailable(u32),

    #[error("no stats recorded for round {0}")]
    StatsNotFound(u32),

    #[error("unauthorized")]
    Unauthorized,

    #[error("malformed result payload: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidNumbers(_) | AppError::InvalidDevice | AppError::InvalidRound(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::RoundNotDrawn(_) => StatusCode::CONFLICT,
            AppError::ResultUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::StatsNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Storage(_) | AppError::Normalize(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = json!({
            "success": false,
            "error": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
