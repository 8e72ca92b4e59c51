use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use blockjobs_core::error::CoreError;
use blockjobs_worker::{EngineError, StoreError};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain, store and engine errors and adds HTTP-specific
/// variants. Implements [`IntoResponse`] to produce consistent JSON error
/// responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `blockjobs_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A job store failure outside of batch execution.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A batch-level failure from the executor.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

type ErrorParts = (StatusCode, &'static str, String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
            },

            // --- Store and engine errors ---
            AppError::Store(err) => classify_store_error(err),
            AppError::Engine(err) => match err {
                EngineError::Store(err) => classify_store_error(err),
                EngineError::Transport(err) => internal("Handler transport failure", err),
                EngineError::TaskFailed(msg) => internal("Job task failed", msg),
            },

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Log `detail` and return a sanitized 500.
fn internal(context: &'static str, detail: &dyn std::fmt::Display) -> ErrorParts {
    tracing::error!(error = %detail, "{context}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

fn classify_store_error(err: &StoreError) -> ErrorParts {
    match err {
        StoreError::NotFound { id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("Job with id {id} not found"),
        ),
        StoreError::Database(err) => classify_sqlx_error(err),
        StoreError::Corrupt(msg) => internal("Corrupt job record", msg),
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// `RowNotFound` maps to 404; everything else maps to 500 with a sanitized
/// message.
fn classify_sqlx_error(err: &sqlx::Error) -> ErrorParts {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        other => internal("Database error", other),
    }
}
