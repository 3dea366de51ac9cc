//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod health;
pub mod sign;
pub mod verify;

use axum::http::StatusCode;

use crate::error::ApiError;

pub use crate::state::AppState;
pub use health::{health, ready, HealthResponse, ReadyResponse};
pub use sign::sign_handler;
pub use verify::{verify_handler, VerifyRequest};

/// Plain OPTIONS requests that are not CORS preflights.
pub async fn preflight() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Fallback for wrong methods on the protocol endpoints.
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
