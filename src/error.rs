//! Error types for the chat relay

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, ChatError>;

#[derive(Error, Debug)]
pub enum ChatError {

    // =============================
    // Request / Pipeline Errors
    // =============================

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Request body too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Generation backend error: {0}")]
    Backend(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification surfaced to HTTP callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Validation,
    Backend,
    Internal,
}

impl ChatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::Validation(_)
            | ChatError::PayloadTooLarge(_)
            | ChatError::UnsupportedMediaType(_) => ErrorKind::Validation,
            ChatError::Backend(_) | ChatError::Http(_) => ErrorKind::Backend,
            ChatError::Config(_) | ChatError::Io(_) => ErrorKind::Internal,
        }
    }

    /// Backend failures stay on 500 so existing widget clients keep working;
    /// `kind` in the body tells them apart from internal faults.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ChatError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ChatError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            _ => match self.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::Backend | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

/// JSON body returned for every failed request
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
    pub kind: ErrorKind,
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let kind = self.kind();

        if kind == ErrorKind::Validation {
            warn!(error = %self, "Rejected chat request");
        } else {
            error!(error = %self, ?kind, "Chat request failed");
        }

        let body = ErrorBody {
            detail: self.to_string(),
            kind,
        };

        (status, Json(body)).into_response()
    }
}
