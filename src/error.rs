//! Common error type and result alias.
//!
//! Every fallible operation in the crate returns [`AppResult`]. The gateway
//! converts errors into JSON responses; the orchestrator converts them into
//! the `error` field of a failed task.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Non-success answer from a generation provider. The message carries the
    /// provider's status code and body verbatim.
    #[error("Provider error: {0}")]
    Provider(String),

    /// The provider accepted the job and later reported it as failed.
    #[error("Provider job failed: {0}")]
    ProviderJobFailed(String),

    #[error("Provider job {job} timed out after {budget_secs} seconds")]
    ProviderTimeout { job: String, budget_secs: f64 },

    #[error("Prompt enhancement failed: {0}")]
    Enhancer(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to persist artifact: {0}")]
    Artifact(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, m.clone()),
            other => {
                tracing::error!(error = %other, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
