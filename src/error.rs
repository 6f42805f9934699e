//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the service. Every
//! handler returns it; [`IntoResponse`] maps each variant to an HTTP
//! status and a `{"message": "..."}` JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// JSON error body returned by every failing endpoint.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorMessage {
    /// Human-readable error message.
    pub message: String,
}

/// Server-side error enum with HTTP status code mapping.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed (missing/invalid field, bad coordinate,
    /// bad rating).
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid session token.
    #[error("{0}")]
    Unauthorized(&'static str),

    /// The requested resource does not exist.
    #[error("{0}")]
    NotFound(&'static str),

    /// The operation conflicts with current state (e.g. a concurrent
    /// unfinished ride).
    #[error("{0}")]
    Conflict(&'static str),

    /// The payment gateway failed to accept a payment.
    #[error("payment gateway error: {0}")]
    PaymentUpstream(String),

    /// Database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Anything else.
    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PaymentUpstream(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorMessage {
            message: self.to_string(),
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_error_kinds() {
        assert_eq!(
            GatewayError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::Unauthorized("no session").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::NotFound("ride not found").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GatewayError::Conflict("ride already exists").status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            GatewayError::PaymentUpstream("refused".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn validation_message_is_verbatim() {
        let err = GatewayError::Validation("evaluation must be between 1 and 5".into());
        assert_eq!(err.to_string(), "evaluation must be between 1 and 5");
    }
}
