use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::collector::LifecycleState;
use crate::event::ValidationError;

/// Persistence adapter failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("schema migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("failed to create store directory {path}: {source}")]
    Directory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Collector runtime rejections
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum CollectorError {
    #[error("collector is not accepting events (state: {state})")]
    NotAccepting { state: LifecycleState },
}

/// Errors surfaced to HTTP callers
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or incomplete ingest body
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Ingest attempted after shutdown began
    #[error("Collector is shutting down (state: {0})")]
    ShuttingDown(LifecycleState),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            Self::ShuttingDown(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = Json(json!({
            "ok": false,
            "error": {
                "message": self.to_string(),
                "type": error_type_name(&self),
            }
        }));

        (status, body).into_response()
    }
}

fn error_type_name(error: &AppError) -> &'static str {
    match error {
        AppError::InvalidPayload(_) => "invalid_payload",
        AppError::ShuttingDown(_) => "shutting_down",
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::InvalidPayload(err.to_string())
    }
}

impl From<CollectorError> for AppError {
    fn from(err: CollectorError) -> Self {
        match err {
            CollectorError::NotAccepting { state } => Self::ShuttingDown(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        let response = AppError::InvalidPayload("bad".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = AppError::ShuttingDown(LifecycleState::Stopping).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_collector_error_maps_to_shutting_down() {
        let err: AppError = CollectorError::NotAccepting {
            state: LifecycleState::Stopped,
        }
        .into();
        assert_eq!(err.to_string(), "Collector is shutting down (state: stopped)");
    }

    #[test]
    fn test_validation_error_maps_to_invalid_payload() {
        let err: AppError = ValidationError::UnexpectedShape.into();
        assert!(matches!(err, AppError::InvalidPayload(_)));
    }
}
