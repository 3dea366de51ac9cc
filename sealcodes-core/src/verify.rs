//! Verification of compact attestations against the key registry.
//!
//! Failures are results, not errors: every rejection is reported with the
//! check that failed so a verifier UI can explain it. Only registry I/O
//! failures surface as `Err`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signature, Verifier as _};
use serde::{Deserialize, Serialize};

use crate::canonical::CanonicalBytes;
use crate::compact::CompactAttestationData;
use crate::error::Result;
use crate::keys::{KeyRegistry, SigningKeyRecord};
use crate::package::Identity;
use crate::signing::parse_timestamp;

/// Why an attestation was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum VerificationFailure {
    MissingSignature,
    MissingKeyId,
    KeyNotFound,
    KeyNotValidAtTimestamp,
    MalformedPayload,
    SignatureMismatch,
    CryptographicVerificationFailed,
}

impl VerificationFailure {
    pub fn code(&self) -> &'static str {
        match self {
            VerificationFailure::MissingSignature => "MissingSignature",
            VerificationFailure::MissingKeyId => "MissingKeyId",
            VerificationFailure::KeyNotFound => "KeyNotFound",
            VerificationFailure::KeyNotValidAtTimestamp => "KeyNotValidAtTimestamp",
            VerificationFailure::MalformedPayload => "MalformedPayload",
            VerificationFailure::SignatureMismatch => "SignatureMismatch",
            VerificationFailure::CryptographicVerificationFailed => {
                "CryptographicVerificationFailed"
            }
        }
    }

    fn message(&self, key_id: &str) -> String {
        match self {
            VerificationFailure::MissingSignature => {
                "No signature found in attestation data".to_string()
            }
            VerificationFailure::MissingKeyId => {
                "No public key ID found in attestation data".to_string()
            }
            VerificationFailure::KeyNotFound => format!("Public key not found: {}", key_id),
            VerificationFailure::KeyNotValidAtTimestamp => {
                "Public key was not valid at the time of attestation".to_string()
            }
            VerificationFailure::MalformedPayload => {
                "Attestation data could not be expanded".to_string()
            }
            VerificationFailure::SignatureMismatch => "Signature verification failed".to_string(),
            VerificationFailure::CryptographicVerificationFailed => {
                "Cryptographic verification failed".to_string()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct VerificationDetails {
    pub key_found: bool,
    pub signature_match: bool,
    pub timestamp_valid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct SignatureVerificationResult {
    pub is_valid: bool,
    pub public_key_id: String,
    pub timestamp: String,
    pub identity: Identity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<VerificationFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<VerificationDetails>,
}

impl SignatureVerificationResult {
    fn base(data: &CompactAttestationData) -> Self {
        Self {
            is_valid: false,
            public_key_id: data.service.key_id.clone(),
            timestamp: data.timestamp.clone(),
            identity: Identity {
                provider: data.identity.provider.clone(),
                identifier: data.identity.identifier.clone(),
            },
            error: None,
            error_code: None,
            details: None,
        }
    }

    fn rejected(
        data: &CompactAttestationData,
        failure: VerificationFailure,
        details: Option<VerificationDetails>,
    ) -> Self {
        let mut result = Self::base(data);
        result.error = Some(failure.message(&data.service.key_id));
        result.error_code = Some(failure);
        result.details = details;
        result
    }

    pub fn failure(&self) -> Option<VerificationFailure> {
        self.error_code
    }
}

/// Verifies compact attestations using keys from `R` only.
#[derive(Debug, Clone)]
pub struct Verifier<R> {
    registry: R,
}

impl<R: KeyRegistry> Verifier<R> {
    pub fn new(registry: R) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub async fn verify(&self, data: &CompactAttestationData) -> Result<SignatureVerificationResult> {
        let Some(signature) = data.signature() else {
            return Ok(SignatureVerificationResult::rejected(
                data,
                VerificationFailure::MissingSignature,
                None,
            ));
        };
        let Some(key_id) = data.key_id() else {
            return Ok(SignatureVerificationResult::rejected(
                data,
                VerificationFailure::MissingKeyId,
                None,
            ));
        };

        let Some(record) = self.registry.find_key(key_id).await? else {
            tracing::debug!(key_id, "Verification key not found");
            return Ok(SignatureVerificationResult::rejected(
                data,
                VerificationFailure::KeyNotFound,
                Some(VerificationDetails {
                    key_found: false,
                    signature_match: false,
                    timestamp_valid: false,
                }),
            ));
        };

        let timestamp_valid = parse_timestamp(&data.timestamp)
            .map(|at| record.is_valid_at(at))
            .unwrap_or(false);
        if !timestamp_valid {
            tracing::debug!(key_id, timestamp = %data.timestamp, "Key not valid at attestation time");
            return Ok(SignatureVerificationResult::rejected(
                data,
                VerificationFailure::KeyNotValidAtTimestamp,
                Some(VerificationDetails {
                    key_found: true,
                    signature_match: false,
                    timestamp_valid: false,
                }),
            ));
        }

        let canonical = match data.expand().and_then(|pkg| CanonicalBytes::new(&pkg)) {
            Ok(canonical) => canonical,
            Err(e) => {
                tracing::debug!(key_id, error = %e, "Attestation data could not be expanded");
                return Ok(SignatureVerificationResult::rejected(
                    data,
                    VerificationFailure::MalformedPayload,
                    Some(VerificationDetails {
                        key_found: true,
                        signature_match: false,
                        timestamp_valid: true,
                    }),
                ));
            }
        };

        let outcome = check_signature(&record, &canonical, signature);
        let details = VerificationDetails {
            key_found: true,
            signature_match: outcome.is_ok(),
            timestamp_valid: true,
        };

        match outcome {
            Ok(()) => {
                tracing::info!(key_id, "Attestation verified");
                let mut result = SignatureVerificationResult::base(data);
                result.is_valid = true;
                result.details = Some(details);
                Ok(result)
            }
            Err(failure) => {
                tracing::info!(key_id, code = failure.code(), "Attestation rejected");
                Ok(SignatureVerificationResult::rejected(data, failure, Some(details)))
            }
        }
    }
}

/// Ed25519 check of `signature_b64` over `canonical` with the registry key.
pub fn check_signature(
    record: &SigningKeyRecord,
    canonical: &CanonicalBytes,
    signature_b64: &str,
) -> std::result::Result<(), VerificationFailure> {
    if !record.is_ed25519() {
        return Err(VerificationFailure::CryptographicVerificationFailed);
    }
    let key = record
        .verifying_key()
        .map_err(|_| VerificationFailure::CryptographicVerificationFailed)?;
    let bytes = BASE64
        .decode(signature_b64.trim())
        .map_err(|_| VerificationFailure::CryptographicVerificationFailed)?;
    let signature = Signature::from_slice(&bytes)
        .map_err(|_| VerificationFailure::CryptographicVerificationFailed)?;

    key.verify(canonical.as_bytes(), &signature)
        .map_err(|_| VerificationFailure::SignatureMismatch)
}
