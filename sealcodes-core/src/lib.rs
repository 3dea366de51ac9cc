//! seal.codes core - document attestation protocol
//!
//! This crate implements the parts of seal.codes that three independent
//! parties (client, signing service, verification service) must agree on
//! byte for byte.
//!
//! # Features
//!
//! - Document fingerprinting with a neutralized exclusion zone (SHA3-256 plus
//!   pHash/dHash perceptual hashes)
//! - A single canonical byte form for attestation packages
//! - Ed25519 signing behind a configuration-selected signer strategy
//! - Versioned compact encoding for embedding in a QR seal
//! - Registry-backed verification with per-check results
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use chrono::Utc;
//! use sealcodes_core::{
//!     compute_hashes, finalize, AttestationBuilder, AuthenticatedIdentity, Document,
//!     Ed25519Signer, ExclusionZone, FillColor, Identity, InMemoryKeyRegistry,
//!     SigningKeyRecord, SigningService, Verifier,
//! };
//!
//! # async fn example(png: Vec<u8>) -> sealcodes_core::Result<()> {
//! let zone = ExclusionZone::new(0, 0, 100, 100, FillColor::white());
//! let hashes = compute_hashes(&Document::new("image/png", png), &zone)?;
//! let unsigned = AttestationBuilder::new(hashes, Identity::new("google", "a@b.com"), zone).build();
//!
//! // Server side
//! let signer = Arc::new(Ed25519Signer::generate("key-1"));
//! let caller = AuthenticatedIdentity { email: "a@b.com".into(), provider: "google".into() };
//! let envelope = SigningService::new(signer.clone()).sign(unsigned.clone(), &caller, Utc::now())?;
//!
//! // Client side
//! let compact = finalize(unsigned, &envelope)?.to_compact();
//! let payload = compact.to_payload()?;
//!
//! // Anyone, later
//! let registry = InMemoryKeyRegistry::new()
//!     .with_key(SigningKeyRecord::ed25519("key-1", signer.public_key_pem()?, Utc::now()));
//! let result = Verifier::new(registry).verify(&compact).await?;
//! assert!(result.is_valid);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod canonical;
pub mod color;
pub mod compact;
pub mod error;
pub mod geometry;
pub mod keys;
pub mod package;
pub mod session;
pub mod signing;
pub mod verify;

#[cfg(feature = "fingerprint")]
pub mod fingerprint;

#[cfg(feature = "network")]
pub mod client;

// Re-export main types for convenience
pub use builder::{build_package, combine, compact, finalize, AttestationBuilder};
pub use canonical::{canonicalize, CanonicalBytes};
pub use color::FillColor;
pub use compact::{CompactAttestationData, COMPACT_FIELD_MAP, COMPACT_FORMAT_VERSION};
pub use error::{Result, SealError};
pub use geometry::SealPlacement;
pub use keys::{InMemoryKeyRegistry, KeyRegistry, SigningKeyRecord, ED25519_ALGORITHM};
pub use package::{
    Document, DocumentHashes, ExclusionZone, FullAttestationPackage, Identity, ServerAddendum,
    ServiceInfo, SignatureEnvelope, SignedAttestation, UnsignedAttestationPackage,
};
pub use session::{
    InMemoryPendingStore, PendingOperationStore, PendingSeal, SealingSession, SealingState,
    SessionToken,
};
pub use signing::{
    format_timestamp, AttestationSigner, AuthenticatedIdentity, Ed25519Signer, MockSigner,
    SignerStrategy, SigningService,
};
pub use verify::{
    SignatureVerificationResult, VerificationDetails, VerificationFailure, Verifier,
};

#[cfg(feature = "fingerprint")]
pub use fingerprint::{compute_hashes, FingerprintEngine, PerceptualHasher, Rasterizer};

#[cfg(feature = "network")]
pub use client::{AttestationClient, AttestationClientConfig};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;

    /// Sign on the server, compact on the client, verify from the payload.
    #[tokio::test]
    async fn test_full_attestation_workflow() {
        let created = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let signer = Arc::new(Ed25519Signer::generate("key-1"));
        let registry = InMemoryKeyRegistry::new().with_key(SigningKeyRecord::ed25519(
            "key-1",
            signer.public_key_pem().expect("public key PEM"),
            created,
        ));

        let unsigned = AttestationBuilder::new(
            DocumentHashes {
                cryptographic: "ab".repeat(32),
                p_hash: "0123456789abcdef".into(),
                d_hash: "fedcba9876543210".into(),
            },
            Identity::new("google", "a@b.com"),
            ExclusionZone::new(0, 0, 100, 100, FillColor::white()),
        )
        .with_user_url("")
        .build();

        let caller = AuthenticatedIdentity {
            email: "a@b.com".into(),
            provider: "google".into(),
        };
        let envelope = SigningService::new(signer)
            .sign(unsigned.clone(), &caller, created + Duration::minutes(5))
            .expect("Failed to sign");

        let payload = finalize(unsigned, &envelope)
            .expect("Failed to combine")
            .to_compact()
            .to_payload()
            .expect("Failed to encode");
        assert!(payload.contains(r#""u":"""#), "empty userUrl must survive");

        let scanned = CompactAttestationData::from_payload(&payload).expect("Failed to decode");
        let result = Verifier::new(registry)
            .verify(&scanned)
            .await
            .expect("Verification failed");
        assert!(result.is_valid, "{:?}", result);
        assert_eq!(result.timestamp, envelope.timestamp);
    }
}
