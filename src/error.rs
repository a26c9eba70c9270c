//! Country Cache error types

use crate::upstream::UpstreamProvider;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Country Cache error type
#[derive(Error, Debug)]
pub enum Error {
    /// One of the two upstream providers could not be reached or decoded
    #[error("Upstream {provider} unavailable: {message}")]
    UpstreamUnavailable {
        provider: UpstreamProvider,
        message: String,
    },

    /// No country record with the given name
    #[error("Country not found: {0}")]
    NotFound(String),

    /// The summary image has not been generated yet
    #[error("Summary image not found")]
    ArtifactMissing,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Summary rendering error
    #[error("Render error: {0}")]
    Render(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub(crate) fn upstream(provider: UpstreamProvider, message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            provider,
            message: message.into(),
        }
    }

    /// HTTP status this error maps to at the API boundary
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound(_) | Self::ArtifactMissing => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::UpstreamUnavailable { provider, .. } => serde_json::json!({
                "error": "External data source unavailable",
                "details": provider.failure_details(),
            }),
            Self::NotFound(_) => serde_json::json!({ "error": "Country not found" }),
            Self::ArtifactMissing => serde_json::json!({ "error": "Summary image not found" }),
            _ => serde_json::json!({ "error": "Internal server error" }),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        (status, Json(body)).into_response()
    }
}

/// Result type alias for Country Cache operations
pub type Result<T> = std::result::Result<T, Error>;
