use anistream_core::{CatalogError, ProviderAttempt, ResolveError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the HTTP layer
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed query parameters or request
    #[error("{0}")]
    BadRequest(String),

    /// Nothing could be resolved; attempts explain why
    #[error("{message}")]
    NotFound {
        message: String,
        attempts: Vec<ProviderAttempt>,
    },

    /// A specifically requested upstream could not be reached
    #[error("{0}")]
    BadGateway(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error body, `message` mirrors the watch page's existing fetch calls
#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attempts: Vec<ProviderAttempt>,
}

impl From<ResolveError> for AppError {
    fn from(e: ResolveError) -> Self {
        let message = e.to_string();
        match e {
            ResolveError::InvalidRequest(msg) => AppError::BadRequest(msg),
            ResolveError::AllProvidersExhausted { attempts } => {
                AppError::NotFound { message, attempts }
            }
            ResolveError::ProviderUnavailable { .. } => AppError::BadGateway(message),
            ResolveError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::NotFound(_) => AppError::NotFound {
                message: e.to_string(),
                attempts: Vec::new(),
            },
            CatalogError::Unavailable(_) => AppError::BadGateway(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::BadGateway(msg) => {
                tracing::warn!("Upstream unavailable: {}", msg);
                StatusCode::BAD_GATEWAY
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = self.to_string();
        let attempts = match self {
            AppError::NotFound { attempts, .. } => attempts,
            _ => Vec::new(),
        };
        (status, Json(ErrorResponse { message, attempts })).into_response()
    }
}
