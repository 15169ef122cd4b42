//! Gateway error taxonomy.
//!
//! # Responsibilities
//! - Classify every failure the edge tier can surface to a caller
//! - Map each class to an HTTP status and JSON body
//!
//! # Design Decisions
//! - Transport failures are absorbed into circuit state and surfaced
//!   as mapped errors; they never escape as panics
//! - Registry misconfiguration is a startup-time error (see config),
//!   not part of this runtime taxonomy

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Runtime errors surfaced by the gateway to its callers.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Unknown service, open circuit, or request timeout.
    #[error("service '{service}' unavailable: {reason}")]
    ServiceUnavailable { service: String, reason: String },

    /// Connection refused, DNS failure, or unclassified transport error.
    #[error("bad gateway for service '{service}': {message}")]
    BadGateway { service: String, message: String },

    /// Structural/security rejection before any proxying.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Fixed-window limit exceeded for the caller identity.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Handshake/auth rejected by the external check.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

/// Request-shape violations detected by the validator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("payload of {declared} bytes exceeds limit of {max} bytes")]
    PayloadTooLarge { declared: u64, max: u64 },

    #[error("invalid path: {reason}")]
    InvalidPath { reason: String },

    #[error("path contains forbidden pattern '{pattern}'")]
    InvalidFormat { pattern: String },
}

impl GatewayError {
    /// HTTP status this error maps to at the edge.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Validation(ValidationError::PayloadTooLarge { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Short machine-readable error code for response bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::ServiceUnavailable { .. } => "service_unavailable",
            GatewayError::BadGateway { .. } => "bad_gateway",
            GatewayError::Validation(ValidationError::PayloadTooLarge { .. }) => {
                "payload_too_large"
            }
            GatewayError::Validation(ValidationError::InvalidPath { .. }) => "invalid_path",
            GatewayError::Validation(ValidationError::InvalidFormat { .. }) => "invalid_format",
            GatewayError::RateLimited { .. } => "rate_limited",
            GatewayError::Unauthorized(_) => "unauthorized",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }));

        let mut response = (status, body).into_response();
        if let GatewayError::RateLimited { retry_after_secs } = self {
            if let Ok(v) = retry_after_secs.to_string().parse() {
                response.headers_mut().insert("retry-after", v);
            }
        }
        response
    }
}
