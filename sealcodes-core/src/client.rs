//! HTTP client for the signing and verification services.
//!
//! Requests are sent once. Every failure the services return is semantic
//! (bad identity, missing key, malformed payload), so nothing is retried.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::compact::CompactAttestationData;
use crate::error::{Result, SealError};
use crate::package::{SignatureEnvelope, UnsignedAttestationPackage};
use crate::verify::SignatureVerificationResult;

pub const SIGN_PATH: &str = "/sign-attestation";
pub const VERIFY_PATH: &str = "/verify-signature";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct AttestationClientConfig {
    /// Service root, e.g. `https://api.seal.codes/functions/v1`
    pub base_url: String,
    pub timeout: Duration,
}

impl AttestationClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequestBody<'a> {
    attestation_data: &'a CompactAttestationData,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Clone)]
pub struct AttestationClient {
    client: Client,
    base_url: String,
}

impl AttestationClient {
    pub fn new(config: AttestationClientConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Ask the signing service to sign `unsigned` as the bearer's identity.
    pub async fn sign(
        &self,
        unsigned: &UnsignedAttestationPackage,
        bearer_token: &str,
    ) -> Result<SignatureEnvelope> {
        let start = Instant::now();
        let response = self
            .client
            .post(self.endpoint(SIGN_PATH))
            .bearer_auth(bearer_token)
            .json(unsigned)
            .send()
            .await?;

        let envelope: SignatureEnvelope = read_json(response).await?;
        debug!(
            key_id = %envelope.public_key_id,
            latency_ms = start.elapsed().as_millis() as u64,
            "Attestation signed remotely"
        );
        Ok(envelope)
    }

    pub async fn verify(&self, data: &CompactAttestationData) -> Result<SignatureVerificationResult> {
        let start = Instant::now();
        let response = self
            .client
            .post(self.endpoint(VERIFY_PATH))
            .json(&VerifyRequestBody {
                attestation_data: data,
            })
            .send()
            .await?;

        let result: SignatureVerificationResult = read_json(response).await?;
        debug!(
            is_valid = result.is_valid,
            latency_ms = start.elapsed().as_millis() as u64,
            "Attestation verified remotely"
        );
        Ok(result)
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);
    warn!(status = status.as_u16(), error = %message, "Attestation service error");
    Err(SealError::RemoteError {
        status: status.as_u16(),
        message,
    })
}

/// `{"error": "..."}` bodies yield their message; anything else is passed through.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.trim().to_string())
}
