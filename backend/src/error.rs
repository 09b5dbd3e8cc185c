//! Error handling for the propagation report service
//!
//! Each pipeline concern has its own error enum; `AppError` is the boundary
//! type handlers return and renders a consistent JSON error body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failure of a single upstream source
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("upstream returned HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("unexpected response shape: {0}")]
    Parse(String),

    #[error("response contained no records")]
    EmptyResponse,

    #[error("fetch cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn code(&self) -> &'static str {
        match self {
            FetchError::Transport(_) => "TRANSPORT_FAIL",
            FetchError::HttpStatus { .. } => "HTTP_STATUS_FAIL",
            FetchError::Parse(_) => "PARSE_FAIL",
            FetchError::EmptyResponse => "EMPTY_RESPONSE",
            FetchError::Cancelled => "CONTEXT_CANCELLED",
        }
    }

    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport(_) => true,
            FetchError::HttpStatus { status } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Failure of the chat-completion call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("LLM authentication failed: {0}")]
    Auth(String),

    #[error("LLM request timed out")]
    Timeout,

    #[error("LLM returned no content")]
    EmptyResponse,

    #[error("LLM API error: {0}")]
    Api(String),
}

impl LlmError {
    pub fn code(&self) -> &'static str {
        match self {
            LlmError::Auth(_) => "LLM_AUTH_FAIL",
            LlmError::Timeout => "LLM_TIMEOUT",
            LlmError::EmptyResponse => "LLM_EMPTY_RESPONSE",
            LlmError::Api(_) => "LLM_API_ERROR",
        }
    }
}

/// Failure of a storage back-end operation
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("failed to write {key}: {message}")]
    Write { key: String, message: String },

    #[error("failed to read {key}: {message}")]
    Read { key: String, message: String },

    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    #[error("storage back-end error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::NotFound(_) => "STORAGE_NOT_FOUND",
            StorageError::Write { .. } => "STORAGE_WRITE_FAIL",
            StorageError::Read { .. } => "STORAGE_READ_FAIL",
            StorageError::InvalidKey(_) => "STORAGE_INVALID_KEY",
            StorageError::Backend(_) => "STORAGE_ERROR",
        }
    }
}

/// Chart builders reject a missing observation
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartError {
    #[error("no observation to chart")]
    InvalidInput,
}

/// Failure while assembling the solar imagery animation
#[derive(Error, Debug)]
pub enum AnimationError {
    #[error("animation disabled")]
    Disabled,

    #[error("no imagery frames could be downloaded")]
    NoFrames,

    #[error("encoder failed: {0}")]
    Encoder(String),

    #[error("animation I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("No upstream source returned usable data")]
    UpstreamUnavailable,

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Missing required artefact: {0}")]
    MissingArtefact(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
        }
    }
}

/// Non-standard status for requests abandoned by the client
fn client_closed_request() -> StatusCode {
    StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST)
}

impl AppError {
    fn status_and_detail(&self) -> (StatusCode, ErrorDetail) {
        match self {
            AppError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("UNAUTHORIZED", msg.clone()),
            ),
            AppError::InvalidPath(path) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "INVALID_PATH".to_string(),
                    message: "Path must not contain '..'".to_string(),
                    field: Some(path.clone()),
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource)),
            ),
            AppError::UpstreamUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorDetail::new(
                    "UPSTREAM_UNAVAILABLE",
                    "K-index, solar cycle and N0NBH sources all failed",
                ),
            ),
            AppError::Llm(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(err.code(), err.to_string()),
            ),
            AppError::Storage(StorageError::NotFound(key)) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", format!("{} not found", key)),
            ),
            AppError::Storage(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(err.code(), err.to_string()),
            ),
            AppError::MissingArtefact(name) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "MISSING_ARTEFACT",
                    format!("Report bundle is missing {}", name),
                ),
            ),
            AppError::Render(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("RENDER_ERROR", msg.clone()),
            ),
            AppError::Cancelled => (
                client_closed_request(),
                ErrorDetail::new("CONTEXT_CANCELLED", "Request was cancelled"),
            ),
            AppError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("CONFIGURATION_ERROR", format!("Configuration error: {}", msg)),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", msg.clone()),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = self.status_and_detail();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;
