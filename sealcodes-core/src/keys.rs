//! Signing key registry.
//!
//! Records are created out of band and never mutated; a key is retired by
//! setting `expires_at`. Registries are consulted on every verification and
//! must not cache records indefinitely.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ed25519_dalek::pkcs8::DecodePublicKey;
use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SealError};

pub const ED25519_ALGORITHM: &str = "Ed25519";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningKeyRecord {
    pub key_id: String,
    /// SPKI PEM (base64 DER or raw 32-byte keys are also accepted)
    pub public_key: String,
    pub algorithm: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl SigningKeyRecord {
    pub fn ed25519(
        key_id: impl Into<String>,
        public_key_pem: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key_id: key_id.into(),
            public_key: public_key_pem.into(),
            algorithm: ED25519_ALGORITHM.to_string(),
            created_at,
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// `created_at <= at <= expires_at` (no upper bound when unset).
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.created_at <= at && self.expires_at.map_or(true, |exp| at <= exp)
    }

    pub fn is_ed25519(&self) -> bool {
        self.algorithm.eq_ignore_ascii_case(ED25519_ALGORITHM)
    }

    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        decode_public_key(&self.public_key)
    }
}

/// Decode an Ed25519 public key from SPKI PEM, base64 SPKI DER, or base64 raw bytes.
pub fn decode_public_key(encoded: &str) -> Result<VerifyingKey> {
    let trimmed = encoded.trim();
    if trimmed.starts_with("-----BEGIN") {
        return VerifyingKey::from_public_key_pem(trimmed)
            .map_err(|e| SealError::KeyError(format!("invalid SPKI PEM: {}", e)));
    }

    let bytes = BASE64
        .decode(trimmed)
        .map_err(|e| SealError::KeyError(format!("invalid base64 public key: {}", e)))?;

    match <[u8; 32]>::try_from(bytes.as_slice()) {
        Ok(raw) => VerifyingKey::from_bytes(&raw)
            .map_err(|e| SealError::KeyError(format!("invalid Ed25519 point: {}", e))),
        Err(_) => VerifyingKey::from_public_key_der(&bytes)
            .map_err(|e| SealError::KeyError(format!("invalid SPKI DER: {}", e))),
    }
}

/// Read-only lookup of signing keys by id.
#[async_trait]
pub trait KeyRegistry: Send + Sync {
    /// `Ok(None)` when the key does not exist; `Err` only for I/O failures.
    async fn find_key(&self, key_id: &str) -> Result<Option<SigningKeyRecord>>;
}

#[async_trait]
impl<T: KeyRegistry + ?Sized> KeyRegistry for Arc<T> {
    async fn find_key(&self, key_id: &str) -> Result<Option<SigningKeyRecord>> {
        (**self).find_key(key_id).await
    }
}

/// Registry held in memory; used by tests, the CLI and development servers.
#[derive(Debug, Default)]
pub struct InMemoryKeyRegistry {
    keys: DashMap<String, SigningKeyRecord>,
}

impl InMemoryKeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: SigningKeyRecord) {
        self.keys.insert(record.key_id.clone(), record);
    }

    pub fn with_key(self, record: SigningKeyRecord) -> Self {
        self.insert(record);
        self
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[async_trait]
impl KeyRegistry for InMemoryKeyRegistry {
    async fn find_key(&self, key_id: &str) -> Result<Option<SigningKeyRecord>> {
        Ok(self.keys.get(key_id).map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::{AttestationSigner, Ed25519Signer};
    use chrono::{Duration, TimeZone};

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_validity_window() {
        let record = SigningKeyRecord::ed25519("k", "pem", created());
        assert!(record.is_valid_at(created()));
        assert!(record.is_valid_at(created() + Duration::days(3650)));
        assert!(!record.is_valid_at(created() - Duration::milliseconds(1)));

        let expiring = record.with_expiry(created() + Duration::days(1));
        assert!(expiring.is_valid_at(created() + Duration::days(1)));
        assert!(!expiring.is_valid_at(created() + Duration::days(1) + Duration::milliseconds(1)));
    }

    #[test]
    fn test_decode_public_key_forms() {
        let signer = Ed25519Signer::generate("k");
        let raw = signer.public_key();

        let from_pem = decode_public_key(&signer.public_key_pem().unwrap()).unwrap();
        assert_eq!(from_pem.to_bytes().to_vec(), raw);

        let from_raw = decode_public_key(&BASE64.encode(&raw)).unwrap();
        assert_eq!(from_raw, from_pem);

        assert!(decode_public_key("-----BEGIN PUBLIC KEY-----\ngarbage\n-----END PUBLIC KEY-----").is_err());
        assert!(decode_public_key("!!!").is_err());
        assert!(decode_public_key(&BASE64.encode([1u8; 7])).is_err());
    }

    #[test]
    fn test_algorithm_match_is_case_insensitive() {
        let mut record = SigningKeyRecord::ed25519("k", "pem", created());
        assert!(record.is_ed25519());
        record.algorithm = "ed25519".into();
        assert!(record.is_ed25519());
        record.algorithm = "ES256".into();
        assert!(!record.is_ed25519());
    }

    #[tokio::test]
    async fn test_in_memory_lookup() {
        let registry = Arc::new(
            InMemoryKeyRegistry::new().with_key(SigningKeyRecord::ed25519("k", "pem", created())),
        );
        assert_eq!(registry.len(), 1);
        assert!(registry.find_key("k").await.unwrap().is_some());
        assert!(registry.find_key("missing").await.unwrap().is_none());
    }
}
