//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how it is
//! rendered as an HTTP response.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use readwithme_core::ports::PortError;
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

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

    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// The JSON body returned for every failed request.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Port(PortError::Validation(_)) => (StatusCode::BAD_REQUEST, "Invalid request"),
            ApiError::Port(PortError::NotFound(_)) => (StatusCode::NOT_FOUND, "Not found"),
            ApiError::Port(PortError::Unauthorized) => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            ApiError::Port(PortError::Generation(_)) => (StatusCode::BAD_GATEWAY, "Generation failed"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        let message = match &self {
            ApiError::Port(PortError::Validation(msg)) | ApiError::Port(PortError::NotFound(msg)) => {
                msg.clone()
            }
            ApiError::Port(PortError::Unauthorized) => "Authentication required".to_string(),
            ApiError::Port(PortError::Generation(_)) => {
                error!("Generation error: {}", self);
                "The content service is unavailable, please try again".to_string()
            }
            _ => {
                error!("Request failed: {}", self);
                "Something went wrong, please try again".to_string()
            }
        };

        (status, Json(ErrorBody { error: kind.to_string(), message })).into_response()
    }
}
