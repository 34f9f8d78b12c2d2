//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use engine::EngineError;
use ledger::LedgerError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),

    /// Conflict with structured detail (per-line or per-id failures).
    #[error("conflict")]
    Conflict(serde_json::Value),

    /// Engine or ledger error.
    #[error(transparent)]
    Engine(EngineError),

    /// Internal server error.
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, serde_json::json!({ "error": msg })),
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, serde_json::json!({ "error": msg }))
            }
            ApiError::Conflict(detail) => (StatusCode::CONFLICT, detail),
            ApiError::Engine(err) => engine_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": msg }),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

fn engine_error_to_response(err: EngineError) -> (StatusCode, serde_json::Value) {
    let status = match &err {
        EngineError::InvalidQuantity => StatusCode::BAD_REQUEST,
        EngineError::NotFound(_) | EngineError::Ledger(LedgerError::ItemNotFound(_)) => {
            StatusCode::NOT_FOUND
        }
        EngineError::InsufficientStock { .. } | EngineError::AlreadyFinalized { .. } => {
            StatusCode::CONFLICT
        }
        EngineError::Ledger(_) => {
            tracing::error!(error = %err, "ledger failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, serde_json::json!({ "error": err.to_string() }))
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Engine(err)
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::EmptyBatch => {
                ApiError::BadRequest("Batch contains no lines".to_string())
            }
            CheckoutError::Rejected(rejection) => ApiError::Conflict(serde_json::json!({
                "error": rejection.to_string(),
                "failures": rejection.failures,
            })),
            CheckoutError::Engine(e) => ApiError::Engine(e),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Engine(EngineError::Ledger(err))
    }
}
