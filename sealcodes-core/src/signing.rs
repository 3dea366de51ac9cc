//! Server-side signing of attestation packages.
//!
//! [`SigningService`] checks the caller's identity against the package, stamps
//! the server fields and signs the canonical bytes with the configured
//! [`AttestationSigner`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use zeroize::Zeroizing;

use crate::canonical::CanonicalBytes;
use crate::error::{Result, SealError};
use crate::package::{
    FullAttestationPackage, ServerAddendum, ServiceInfo, SignatureEnvelope,
    UnsignedAttestationPackage,
};

/// Which signer implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignerStrategy {
    Ed25519,
    /// Non-cryptographic placeholder for local development and tests.
    Mock,
}

impl SignerStrategy {
    pub fn is_cryptographic(&self) -> bool {
        matches!(self, SignerStrategy::Ed25519)
    }
}

impl fmt::Display for SignerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignerStrategy::Ed25519 => f.write_str("ed25519"),
            SignerStrategy::Mock => f.write_str("mock"),
        }
    }
}

impl FromStr for SignerStrategy {
    type Err = SealError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ed25519" => Ok(SignerStrategy::Ed25519),
            "mock" => Ok(SignerStrategy::Mock),
            other => Err(SealError::ServerConfiguration(format!(
                "unknown signer strategy '{}'",
                other
            ))),
        }
    }
}

/// A key that can sign canonical attestation bytes.
pub trait AttestationSigner: Send + Sync {
    /// Registry id of the key, copied into `serviceInfo.publicKeyId`.
    fn key_id(&self) -> &str;

    /// Raw public key bytes (informational copy for the envelope).
    fn public_key(&self) -> Vec<u8>;

    fn strategy(&self) -> SignerStrategy;

    fn sign(&self, message: &CanonicalBytes) -> Result<Vec<u8>>;
}

/// Ed25519 signer. The private key is zeroized on drop.
pub struct Ed25519Signer {
    key_id: String,
    signing_key: SigningKey,
}

impl Ed25519Signer {
    pub fn new(key_id: impl Into<String>, signing_key: SigningKey) -> Self {
        Self {
            key_id: key_id.into(),
            signing_key,
        }
    }

    /// Generate a fresh key from the OS RNG.
    pub fn generate(key_id: impl Into<String>) -> Self {
        Self::new(key_id, SigningKey::generate(&mut OsRng))
    }

    /// Load a PKCS#8 PEM private key.
    pub fn from_pkcs8_pem(key_id: impl Into<String>, pem: &str) -> Result<Self> {
        let signing_key = SigningKey::from_pkcs8_pem(pem.trim())
            .map_err(|e| SealError::KeyError(format!("invalid PKCS#8 private key: {}", e)))?;
        Ok(Self::new(key_id, signing_key))
    }

    pub fn private_key_pem(&self) -> Result<Zeroizing<String>> {
        self.signing_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| SealError::KeyError(e.to_string()))
    }

    /// SPKI PEM of the public key, the form stored in the key registry.
    pub fn public_key_pem(&self) -> Result<String> {
        self.signing_key
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| SealError::KeyError(e.to_string()))
    }
}

impl fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl AttestationSigner for Ed25519Signer {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn public_key(&self) -> Vec<u8> {
        self.signing_key.verifying_key().to_bytes().to_vec()
    }

    fn strategy(&self) -> SignerStrategy {
        SignerStrategy::Ed25519
    }

    fn sign(&self, message: &CanonicalBytes) -> Result<Vec<u8>> {
        Ok(self.signing_key.sign(message.as_bytes()).to_bytes().to_vec())
    }
}

/// SHA3-256 placeholder signer. Output is not a signature and never verifies.
#[derive(Debug, Clone)]
pub struct MockSigner {
    key_id: String,
}

impl MockSigner {
    pub fn new(key_id: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
        }
    }
}

impl Default for MockSigner {
    fn default() -> Self {
        Self::new("mock-key")
    }
}

impl AttestationSigner for MockSigner {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn public_key(&self) -> Vec<u8> {
        Sha3_256::digest(self.key_id.as_bytes()).to_vec()
    }

    fn strategy(&self) -> SignerStrategy {
        SignerStrategy::Mock
    }

    fn sign(&self, message: &CanonicalBytes) -> Result<Vec<u8>> {
        let mut hasher = Sha3_256::new();
        hasher.update(self.key_id.as_bytes());
        hasher.update(message.as_bytes());
        Ok(hasher.finalize().to_vec())
    }
}

/// Identity resolved from the caller's credential by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedIdentity {
    pub email: String,
    pub provider: String,
}

/// `YYYY-MM-DDTHH:MM:SS.mmmZ`
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SealError::InvalidTimestamp(format!("'{}': {}", value, e)))
}

/// Identity gate plus signer. `signer` is `None` when no key is provisioned.
#[derive(Clone)]
pub struct SigningService {
    signer: Option<Arc<dyn AttestationSigner>>,
}

impl SigningService {
    pub fn new(signer: Arc<dyn AttestationSigner>) -> Self {
        Self {
            signer: Some(signer),
        }
    }

    pub fn unconfigured() -> Self {
        Self { signer: None }
    }

    pub fn signer(&self) -> Option<&Arc<dyn AttestationSigner>> {
        self.signer.as_ref()
    }

    pub fn sign(
        &self,
        unsigned: UnsignedAttestationPackage,
        caller: &AuthenticatedIdentity,
        now: DateTime<Utc>,
    ) -> Result<SignatureEnvelope> {
        check_identity(&unsigned, caller)?;

        let signer = self.signer.as_ref().ok_or_else(|| {
            SealError::ServerConfiguration("no active signing key is provisioned".into())
        })?;

        let timestamp = format_timestamp(now);
        let addendum = ServerAddendum {
            timestamp: timestamp.clone(),
            service_info: ServiceInfo {
                public_key_id: signer.key_id().to_string(),
            },
        };
        let package = FullAttestationPackage::from_parts(unsigned, addendum);
        let canonical = CanonicalBytes::new(&package)?;
        let signature = signer.sign(&canonical)?;

        tracing::info!(
            key_id = signer.key_id(),
            provider = %package.identity.provider,
            strategy = %signer.strategy(),
            package = %canonical.digest_hex(),
            "Attestation signed"
        );

        Ok(SignatureEnvelope {
            timestamp,
            signature: BASE64.encode(signature),
            public_key: BASE64.encode(signer.public_key()),
            public_key_id: signer.key_id().to_string(),
        })
    }
}

/// Reject packages whose identity is not the authenticated caller's.
pub fn check_identity(
    unsigned: &UnsignedAttestationPackage,
    caller: &AuthenticatedIdentity,
) -> Result<()> {
    if unsigned.identity.identifier != caller.email {
        return Err(SealError::IdentityMismatch(
            "package identifier does not match the authenticated user".into(),
        ));
    }
    if unsigned.identity.provider != caller.provider {
        return Err(SealError::IdentityMismatch(format!(
            "package provider '{}' does not match authenticated provider '{}'",
            unsigned.identity.provider, caller.provider
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::FillColor;
    use crate::package::{DocumentHashes, ExclusionZone, Identity};
    use chrono::TimeZone;
    use ed25519_dalek::pkcs8::DecodePublicKey;
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    struct CountingSigner(std::sync::atomic::AtomicUsize);

    impl AttestationSigner for CountingSigner {
        fn key_id(&self) -> &str {
            "counting"
        }
        fn public_key(&self) -> Vec<u8> {
            vec![]
        }
        fn strategy(&self) -> SignerStrategy {
            SignerStrategy::Mock
        }
        fn sign(&self, _message: &CanonicalBytes) -> Result<Vec<u8>> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(vec![0])
        }
    }

    fn unsigned(identifier: &str) -> UnsignedAttestationPackage {
        UnsignedAttestationPackage {
            hashes: DocumentHashes {
                cryptographic: "aa".into(),
                p_hash: "bb".into(),
                d_hash: "cc".into(),
            },
            identity: Identity::new("google", identifier),
            exclusion_zone: ExclusionZone::new(0, 0, 100, 100, FillColor::white()),
            user_url: None,
        }
    }

    fn caller() -> AuthenticatedIdentity {
        AuthenticatedIdentity {
            email: "a@b.com".into(),
            provider: "google".into(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 6, 7, 8, 9).unwrap()
    }

    #[test]
    fn test_timestamp_format() {
        assert_eq!(format_timestamp(now()), "2025-05-06T07:08:09.000Z");
        assert_eq!(parse_timestamp("2025-05-06T07:08:09.000Z").unwrap(), now());
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("Ed25519".parse::<SignerStrategy>().unwrap(), SignerStrategy::Ed25519);
        assert_eq!("mock".parse::<SignerStrategy>().unwrap(), SignerStrategy::Mock);
        assert!("rsa".parse::<SignerStrategy>().is_err());
        assert!(!SignerStrategy::Mock.is_cryptographic());
    }

    #[test]
    fn test_sign_produces_verifiable_envelope() {
        let signer = Arc::new(Ed25519Signer::generate("key-1"));
        let service = SigningService::new(signer.clone());

        let envelope = service.sign(unsigned("a@b.com"), &caller(), now()).unwrap();
        assert_eq!(envelope.public_key_id, "key-1");
        assert_eq!(envelope.timestamp, "2025-05-06T07:08:09.000Z");

        let package = FullAttestationPackage::from_parts(
            unsigned("a@b.com"),
            ServerAddendum::from(&envelope),
        );
        let canonical = CanonicalBytes::new(&package).unwrap();
        let key = VerifyingKey::from_public_key_pem(&signer.public_key_pem().unwrap()).unwrap();
        let sig = Signature::from_slice(&BASE64.decode(&envelope.signature).unwrap()).unwrap();
        assert!(key.verify(canonical.as_bytes(), &sig).is_ok());
        assert_eq!(BASE64.decode(&envelope.public_key).unwrap(), key.to_bytes().to_vec());
    }

    #[test]
    fn test_ed25519_is_deterministic() {
        let service = SigningService::new(Arc::new(Ed25519Signer::generate("key-1")));
        let a = service.sign(unsigned("a@b.com"), &caller(), now()).unwrap();
        let b = service.sign(unsigned("a@b.com"), &caller(), now()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_identity_mismatch_never_reaches_signer() {
        let signer = Arc::new(CountingSigner(Default::default()));
        let service = SigningService::new(signer.clone());

        let err = service.sign(unsigned("c@d.com"), &caller(), now()).unwrap_err();
        assert!(matches!(err, SealError::IdentityMismatch(_)));

        let other_provider = AuthenticatedIdentity {
            email: "a@b.com".into(),
            provider: "github".into(),
        };
        let err = service.sign(unsigned("a@b.com"), &other_provider, now()).unwrap_err();
        assert!(matches!(err, SealError::IdentityMismatch(_)));

        assert_eq!(signer.0.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unconfigured_service() {
        let err = SigningService::unconfigured()
            .sign(unsigned("a@b.com"), &caller(), now())
            .unwrap_err();
        assert!(matches!(err, SealError::ServerConfiguration(_)));
    }

    #[test]
    fn test_pem_round_trip() {
        let signer = Ed25519Signer::generate("key-1");
        let pem = signer.private_key_pem().unwrap();
        let loaded = Ed25519Signer::from_pkcs8_pem("key-1", &pem).unwrap();
        assert_eq!(loaded.public_key(), signer.public_key());
        assert!(Ed25519Signer::from_pkcs8_pem("key-1", "not a key").is_err());
    }

    #[test]
    fn test_mock_signer_output_is_stable() {
        let service = SigningService::new(Arc::new(MockSigner::default()));
        let a = service.sign(unsigned("a@b.com"), &caller(), now()).unwrap();
        let b = service.sign(unsigned("a@b.com"), &caller(), now()).unwrap();
        assert_eq!(a.signature, b.signature);
        assert_eq!(a.public_key_id, "mock-key");
        assert_eq!(BASE64.decode(&a.signature).unwrap().len(), 32);
    }
}
