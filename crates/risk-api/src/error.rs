//! HTTP error surface for the risk API.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Stable machine-readable code, e.g. "LOCK_CONFLICT" or "VALIDATION_ERROR".
    pub code: String,
    /// What went wrong, in words.
    pub message: String,
}

/// Handler-level error. `From` impls funnel engine and extractor
/// failures into it, so handlers mostly just use `?`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Internal(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid request body: {0}")]
    JsonRejection(String),
}

impl ApiError {
    /// HTTP status paired with the code string reported in the body.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "LOCK_CONFLICT"),
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            ApiError::Serialization(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "SERIALIZATION_ERROR")
            }
            ApiError::JsonRejection(_) => (StatusCode::BAD_REQUEST, "INVALID_JSON"),
        }
    }
}

impl From<prop_core::Error> for ApiError {
    fn from(err: prop_core::Error) -> Self {
        match err {
            prop_core::Error::AccountNotFound(_) | prop_core::Error::TradeNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            prop_core::Error::LockConflict(_) => ApiError::Conflict(err.to_string()),
            prop_core::Error::InvalidTradingHours { .. } => ApiError::Validation(err.to_string()),
            prop_core::Error::Database(e) => ApiError::Database(e),
            prop_core::Error::Json(e) => ApiError::Serialization(e),
            prop_core::Error::Config { message } => ApiError::Internal(message),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::warn!(error = %rejection, "Rejected malformed request body");
        ApiError::JsonRejection(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // 5xx means a bug or broken infrastructure, so log at error level
        if status.is_server_error() {
            tracing::error!(code, error = %self, "Request failed");
        }

        let body = ErrorResponse {
            code: code.to_string(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_engine_errors_map_to_http_statuses() {
        let id = Uuid::new_v4();

        let not_found: ApiError = prop_core::Error::AccountNotFound(id).into();
        assert_eq!(not_found.status_and_code().0, StatusCode::NOT_FOUND);

        let conflict: ApiError = prop_core::Error::LockConflict(id).into();
        assert_eq!(conflict.status_and_code(), (StatusCode::CONFLICT, "LOCK_CONFLICT"));

        let invalid: ApiError = prop_core::Error::InvalidTradingHours {
            start: 2000,
            end: 100,
        }
        .into();
        assert_eq!(invalid.status_and_code().0, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_display_carries_engine_message() {
        let id = Uuid::new_v4();
        let err: ApiError = prop_core::Error::AccountNotFound(id).into();
        assert_eq!(err.to_string(), format!("Account not found: {}", id));
    }
}
