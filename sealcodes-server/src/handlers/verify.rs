//! Attestation verification handler
//!
//! Handles POST /verify-signature. Every well-formed request gets a 200 with
//! a verdict; rejected attestations are data, not HTTP errors.

use axum::{body::Bytes, extract::State, Json};
use sealcodes_core::{CompactAttestationData, SignatureVerificationResult};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for verification
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// Compact attestation as decoded from the QR seal
    pub attestation_data: CompactAttestationData,
}

/// Verify a compact attestation
///
/// The public key is taken from the key registry using the key id carried
/// in the attestation (`s.k`). Checks run in order: signature and key id
/// present, key exists, key valid at the attestation timestamp, Ed25519
/// signature over the canonical package.
#[utoipa::path(
    post,
    path = "/verify-signature",
    tag = "Verification",
    request_body(content = VerifyRequest, description = "Compact attestation to verify"),
    responses(
        (status = 200, description = "Verification completed", body = SignatureVerificationResult),
        (status = 405, description = "Method not allowed"),
        (status = 500, description = "Malformed body or key registry unavailable")
    )
)]
pub async fn verify_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SignatureVerificationResult>, ApiError> {
    let request: VerifyRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::malformed(format!("invalid verification request: {}", e)))?;

    let result = state.verifier.verify(&request.attestation_data).await?;
    Ok(Json(result))
}
