//! Application error type and its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::offline::{GatewayError, StoreError};

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    BadRequest(String),
}

/// Error body returned to callers
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error_type: &'static str,
    pub message: String,
}

impl AppError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Gateway(GatewayError::InvalidUrl { .. }) => (StatusCode::BAD_REQUEST, "invalid_url"),
            Self::Gateway(GatewayError::Transport { .. }) => (StatusCode::BAD_GATEWAY, "upstream_unreachable"),
            Self::Gateway(GatewayError::CacheMiss { .. }) => (StatusCode::SERVICE_UNAVAILABLE, "offline_cache_miss"),
            Self::Gateway(GatewayError::Queue(_)) | Self::Store(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "queue_store_error")
            }
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_type();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }
        (
            status,
            Json(ErrorResponse {
                error_type,
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let miss = AppError::from(GatewayError::CacheMiss {
            url: "https://acme.api.example.com/leases.php".to_string(),
        });
        assert_eq!(miss.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);

        let down = AppError::from(GatewayError::Transport {
            url: "https://acme.api.example.com/".to_string(),
            reason: "connection refused".to_string(),
        });
        assert_eq!(down.into_response().status(), StatusCode::BAD_GATEWAY);

        let dup = AppError::from(StoreError::DuplicateId("x".to_string()));
        assert_eq!(dup.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
