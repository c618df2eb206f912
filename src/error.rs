//! Application error types and their HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result alias used throughout the gateway
pub type Result<T> = std::result::Result<T, AppError>;

/// Errors surfaced by the gateway
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Language pair not supported")]
    UnsupportedLanguagePair(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Failed to load model '{model}': {reason}")]
    ModelLoad { model: String, reason: String },

    #[error("Translation failed: {0}")]
    Translation(String),

    #[error("{0}")]
    BackendError(String),

    #[error("No healthy endpoints available: {0}")]
    NoHealthyEndpoints(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::UnsupportedLanguagePair(_) | AppError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Rebuild an equivalent error for every caller sharing one failure.
    /// Wrapped library errors keep their kind and message.
    pub fn replicate(&self) -> AppError {
        match self {
            AppError::UnsupportedLanguagePair(pair) => AppError::UnsupportedLanguagePair(pair.clone()),
            AppError::InvalidRequest(msg) => AppError::InvalidRequest(msg.clone()),
            AppError::RateLimited => AppError::RateLimited,
            AppError::Timeout(secs) => AppError::Timeout(*secs),
            AppError::ModelLoad { model, reason } => AppError::ModelLoad {
                model: model.clone(),
                reason: reason.clone(),
            },
            AppError::Translation(msg) => AppError::Translation(msg.clone()),
            AppError::BackendError(msg) => AppError::BackendError(msg.clone()),
            AppError::NoHealthyEndpoints(msg) => AppError::NoHealthyEndpoints(msg.clone()),
            AppError::HttpClient(e) => AppError::BackendError(format!("HTTP client error: {}", e)),
            AppError::Config(e) => AppError::Config(config::ConfigError::Message(e.to_string())),
            AppError::Io(e) => AppError::Io(std::io::Error::new(e.kind(), e.to_string())),
            AppError::Internal(msg) => AppError::Internal(msg.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, error = %message, "Request failed");
        } else {
            tracing::warn!(status = %status, error = %message, "Request rejected");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}
