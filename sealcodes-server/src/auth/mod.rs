//! Bearer token authentication
//!
//! The auth provider issues HS256 JWTs signed with a shared secret. A token
//! resolves to the caller's email and the OAuth provider they signed in with
//! (`app_metadata.provider`, `"unknown"` when absent). The signing handler
//! compares that identity against the package it is asked to sign.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use sealcodes_core::AuthenticatedIdentity;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

const UNKNOWN_PROVIDER: &str = "unknown";

/// Resolves a bearer token to the identity it was issued for.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<AuthenticatedIdentity, ApiError>;
}

#[derive(Debug, Default, Deserialize)]
struct AppMetadata {
    #[serde(default)]
    provider: Option<String>,
}

/// Claims issued by the auth provider
#[derive(Debug, Deserialize)]
struct AuthClaims {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    app_metadata: AppMetadata,
    /// Expiration time (validated by jsonwebtoken)
    #[allow(dead_code)]
    exp: u64,
}

/// HS256 validation against the auth provider's shared secret.
pub struct JwtIdentityResolver {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityResolver {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        // Provider tokens carry an audience we do not pin.
        validation.validate_aud = false;
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    fn validate(&self, token: &str) -> Result<AuthClaims, ApiError> {
        decode::<AuthClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    ApiError::auth_error("AUTH_TOKEN_EXPIRED", "Invalid authentication token")
                }
                _ => {
                    tracing::debug!(error = %e, "JWT validation failed");
                    ApiError::auth_error("AUTH_INVALID_TOKEN", "Invalid authentication token")
                }
            })
    }
}

#[async_trait]
impl IdentityResolver for JwtIdentityResolver {
    async fn resolve(&self, token: &str) -> Result<AuthenticatedIdentity, ApiError> {
        let claims = self.validate(token)?;
        let email = claims
            .email
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ApiError::auth_error("AUTH_INVALID_TOKEN", "Token has no email claim"))?;
        let provider = claims
            .app_metadata
            .provider
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| UNKNOWN_PROVIDER.to_string());
        Ok(AuthenticatedIdentity { email, provider })
    }
}

#[async_trait]
impl<T: IdentityResolver + ?Sized> IdentityResolver for Arc<T> {
    async fn resolve(&self, token: &str) -> Result<AuthenticatedIdentity, ApiError> {
        (**self).resolve(token).await
    }
}

/// Extract the Bearer token from the Authorization header
pub fn extract_bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let auth_header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| {
            ApiError::auth_error("AUTH_MISSING_TOKEN", "Missing authorization header")
        })?;

    let auth_value = auth_header.to_str().map_err(|_| {
        ApiError::auth_error(
            "AUTH_INVALID_TOKEN",
            "Invalid Authorization header encoding",
        )
    })?;

    auth_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            ApiError::auth_error(
                "AUTH_INVALID_TOKEN",
                "Authorization header must use Bearer scheme",
            )
        })
}

/// Caller identity resolved from `Authorization: Bearer <token>`.
///
/// Returns 401 with structured error codes on any failure.
pub struct AuthenticatedCaller(pub AuthenticatedIdentity);

impl FromRequestParts<AppState> for AuthenticatedCaller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(parts)?;

        let resolver = state.identity_resolver.as_ref().ok_or_else(|| {
            ApiError::unauthorized("Authentication not configured (missing AUTH_JWT_SECRET)")
        })?;

        let identity = resolver.resolve(token).await?;
        tracing::debug!(provider = %identity.provider, "Caller authenticated");
        Ok(AuthenticatedCaller(identity))
    }
}
