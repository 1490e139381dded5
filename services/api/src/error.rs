//! services/api/src/error.rs
//!
//! Defines the primary error type for the API service and the JSON error
//! envelope returned by the HTTP handlers.

use crate::config::ConfigError;
use autodoc_core::forms::FieldError;
use autodoc_core::ports::PortError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};
use tracing::error;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failure to apply the bundled migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

//=========================================================================================
// HTTP Error Envelope
//=========================================================================================

const INTERNAL_MESSAGE: &str = "Internal server error";

/// An error on its way to the client as `{"status": "error", "message": ...}`.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    message: String,
    /// Status the completion API answered with, when that is the cause.
    api_status_code: Option<u16>,
    /// Internal detail, only filled in debug mode.
    debug: Option<String>,
    /// Per-field validation messages.
    errors: Option<Value>,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            api_status_code: None,
            debug: None,
            errors: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Logs `detail` and hides it from the client unless `debug` is on.
    pub fn internal(detail: impl std::fmt::Display, debug: bool) -> Self {
        let detail = detail.to_string();
        error!("Internal error while handling request: {}", detail);
        Self {
            debug: debug.then_some(detail),
            ..Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE)
        }
    }

    /// Maps a port failure onto the response taxonomy.
    pub fn from_port(err: PortError, debug: bool) -> Self {
        match err {
            PortError::NotFound(message) => Self::not_found(message),
            PortError::Validation(message) => Self::bad_request(message),
            PortError::Upstream { status, message } => {
                error!("Completion API error (status {:?}): {}", status, message);
                let http_status = match status {
                    Some(code) if code < 500 => StatusCode::BAD_REQUEST,
                    _ => StatusCode::BAD_GATEWAY,
                };
                Self {
                    api_status_code: status,
                    ..Self::new(http_status, format!("API error: {}", message))
                }
            }
            PortError::Unexpected(detail) => Self::internal(detail, debug),
        }
    }

    /// Attaches form validation errors, serialized under `errors`.
    pub fn with_errors(mut self, errors: &[FieldError]) -> Self {
        self.errors = serde_json::to_value(errors).ok();
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "status": "error",
            "message": self.message,
        });
        if let Some(code) = self.api_status_code {
            body["api_status_code"] = json!(code);
        }
        if let Some(detail) = self.debug {
            body["debug"] = json!(detail);
        }
        if let Some(errors) = self.errors {
            body["errors"] = errors;
        }
        (self.status, Json(body)).into_response()
    }
}
