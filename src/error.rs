//! Error types for the content pipeline
//!
//! The `Display` output is only logged; HTTP clients get the shaped
//! [`ErrorResponse`] body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Result alias used by the library core
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure while talking to the content API
    #[error("content source unavailable: {0}")]
    SourceUnavailable(String),

    /// The content API answered with a non-success status
    #[error("content source rejected the request ({status}): {message}")]
    SourceRejected { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("missing configuration: {0} must be set")]
    ConfigurationMissing(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Malformed rich text inside a single content block
    #[error("rich text transform failed: {0}")]
    Transform(String),

    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(..) => StatusCode::NOT_FOUND,
            Self::InvalidCursor(..) => StatusCode::BAD_REQUEST,
            Self::SourceUnavailable(..) | Self::SourceRejected { .. } | Self::Decode(..) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the error means the requested document does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(..))
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub errors: Vec<String>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();

        // Upstream details stay in the logs
        let errors = match &self {
            Self::NotFound(..) | Self::InvalidCursor(..) => vec![self.to_string()],
            _ => {
                tracing::error!("request failed: {}", self);
                Vec::new()
            }
        };

        (
            status,
            Json(ErrorResponse {
                success: false,
                errors,
            }),
        )
            .into_response()
    }
}
