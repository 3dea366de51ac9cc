//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sealcodes_core::SealError;
use thiserror::Error;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid authentication
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authentication error with specific error code
    #[error("{message}")]
    AuthError { message: String, code: String },

    /// Wrong HTTP method for an existing endpoint
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Request body could not be parsed into the expected shape
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Protocol error from the core library
    #[error("Seal error: {0}")]
    Seal(#[from] SealError),
}

impl ApiError {
    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Create a malformed request error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRequest(message.into())
    }

    /// Create an authentication error with a specific error code
    pub fn auth_error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AuthError {
            message: message.into(),
            code: code.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) | Self::AuthError { .. } => StatusCode::UNAUTHORIZED,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            // Malformed bodies are reported as server errors, matching the deployed services.
            Self::MalformedRequest(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Seal(ref e) => match e {
                SealError::IdentityMismatch(_) => StatusCode::FORBIDDEN,

                SealError::UnsupportedFormat(_)
                | SealError::GeometryOutOfBounds(_)
                | SealError::InvalidColor(_)
                | SealError::UnsupportedCompactVersion { .. }
                | SealError::InvalidTimestamp(_)
                | SealError::EnvelopeMismatch(_) => StatusCode::BAD_REQUEST,

                SealError::RemoteError { .. } => StatusCode::BAD_GATEWAY,

                SealError::ServerConfiguration(_)
                | SealError::KeyError(_)
                | SealError::SerializationError(_)
                | SealError::RegistryError(_)
                | SealError::SessionNotFound
                | SealError::InvalidTransition { .. } => StatusCode::INTERNAL_SERVER_ERROR,

                #[allow(unreachable_patterns)]
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Get the error code for programmatic error handling
    pub fn error_code(&self) -> &str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::AuthError { code, .. } => code.as_str(),
            Self::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            Self::MalformedRequest(_) => "MALFORMED_REQUEST",
            Self::Seal(ref e) => match e {
                SealError::IdentityMismatch(_) => "IDENTITY_MISMATCH",
                SealError::ServerConfiguration(_) => "SERVER_CONFIGURATION_ERROR",
                SealError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
                SealError::GeometryOutOfBounds(_) => "GEOMETRY_OUT_OF_BOUNDS",
                SealError::InvalidColor(_) => "INVALID_COLOR",
                SealError::UnsupportedCompactVersion { .. } => "UNSUPPORTED_COMPACT_VERSION",
                SealError::InvalidTimestamp(_) => "INVALID_TIMESTAMP",
                SealError::EnvelopeMismatch(_) => "ENVELOPE_MISMATCH",
                SealError::KeyError(_) => "KEY_ERROR",
                SealError::SerializationError(_) => "SERIALIZATION_ERROR",
                SealError::RegistryError(_) => "REGISTRY_ERROR",
                SealError::RemoteError { .. } => "UPSTREAM_ERROR",
                _ => "INTERNAL_ERROR",
            },
        }
    }

    /// Get sanitized error message for client response
    pub fn client_message(&self) -> String {
        match self {
            Self::MethodNotAllowed => "Method not allowed".to_string(),
            Self::MalformedRequest(_) => "Internal server error".to_string(),
            Self::Seal(ref e) => match e {
                SealError::IdentityMismatch(detail) => format!("Identity mismatch: {}", detail),
                SealError::ServerConfiguration(_) => "Server configuration error".to_string(),
                SealError::UnsupportedCompactVersion { version, current } => format!(
                    "Unsupported compact attestation version {} (current: {})",
                    version, current
                ),
                SealError::UnsupportedFormat(_)
                | SealError::GeometryOutOfBounds(_)
                | SealError::InvalidColor(_)
                | SealError::InvalidTimestamp(_)
                | SealError::EnvelopeMismatch(_) => e.to_string(),
                _ => "Internal server error".to_string(),
            },
            // For other errors, use the Display message
            _ => self.to_string(),
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::AuthError { .. } => "auth_error",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::MalformedRequest(_) => "malformed_request",
            Self::Seal(_) => "seal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code().to_string();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        // Log based on severity, always including internal details
        match &self {
            Self::MethodNotAllowed => {
                tracing::warn!(
                    status = %status,
                    category = category,
                    code = %code,
                    "Client error"
                );
            }
            Self::Unauthorized(_) | Self::AuthError { .. } => {
                tracing::warn!(
                    status = %status,
                    category = category,
                    code = %code,
                    error = %internal_message,
                    "Authentication error"
                );
            }
            Self::Seal(SealError::IdentityMismatch(_)) => {
                tracing::warn!(
                    status = %status,
                    category = category,
                    code = %code,
                    error = %internal_message,
                    "Identity mismatch"
                );
            }
            Self::MalformedRequest(_) => {
                tracing::error!(
                    status = %status,
                    category = category,
                    code = %code,
                    error = %internal_message,
                    "Server error"
                );
            }
            Self::Seal(_) => {
                tracing::error!(
                    status = %status,
                    category = category,
                    code = %code,
                    error = %internal_message,
                    client_message = %client_message,
                    "Seal error (internal details logged)"
                );
            }
        }

        // All error responses include a `code` field for programmatic error handling
        let body = serde_json::json!({
            "error": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}
