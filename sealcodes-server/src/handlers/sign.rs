//! Attestation signing handler
//!
//! Handles POST /sign-attestation. The caller must be the identity named in
//! the package; the server adds the timestamp and key id and signs the
//! canonical bytes. Nothing about the document is stored.

use axum::{body::Bytes, extract::State, Json};
use chrono::Utc;
use sealcodes_core::{SignatureEnvelope, UnsignedAttestationPackage};

use crate::auth::AuthenticatedCaller;
use crate::error::ApiError;
use crate::state::AppState;

/// Sign an attestation package
///
/// The body is the unsigned package produced by the client after
/// fingerprinting the document. Unknown fields are ignored and are not
/// covered by the signature.
#[utoipa::path(
    post,
    path = "/sign-attestation",
    tag = "Signing",
    request_body(
        content = UnsignedAttestationPackage,
        description = "Package to sign; identity must match the bearer token"
    ),
    responses(
        (status = 200, description = "Package signed", body = SignatureEnvelope),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Package identity or provider differs from the caller"),
        (status = 405, description = "Method not allowed"),
        (status = 500, description = "No signing key provisioned, or malformed body")
    ),
    security(("bearer_auth" = []))
)]
pub async fn sign_handler(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    body: Bytes,
) -> Result<Json<SignatureEnvelope>, ApiError> {
    let unsigned: UnsignedAttestationPackage = serde_json::from_slice(&body)
        .map_err(|e| ApiError::malformed(format!("invalid attestation package: {}", e)))?;

    let envelope = state.signing.sign(unsigned, &caller, Utc::now())?;
    Ok(Json(envelope))
}
