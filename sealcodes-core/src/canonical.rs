//! Canonical byte form of a [`FullAttestationPackage`].
//!
//! `CanonicalBytes` has a private inner field and a single constructor, so any
//! code that signs or verifies must go through the same serialization path.
//!
//! The form is compact JSON with fields in declaration order:
//!
//! ```text
//! {"hashes":{"cryptographic":…,"pHash":…,"dHash":…},
//!  "identity":{"provider":…,"identifier":…},
//!  "exclusionZone":{"x":…,"y":…,"width":…,"height":…,"fillColor":"#RRGGBB"},
//!  "timestamp":…,
//!  "serviceInfo":{"publicKeyId":…},
//!  "userUrl":…}
//! ```
//!
//! `userUrl` is present only when set; an empty string is emitted as `""`.
//! The package is serialized straight from the typed struct and never through
//! `serde_json::Value`, whose map type would reorder keys.

use sha3::{Digest, Sha3_256};

use crate::error::Result;
use crate::package::FullAttestationPackage;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    pub fn new(package: &FullAttestationPackage) -> Result<Self> {
        Ok(Self(serde_json::to_vec(package)?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Hex SHA3-256 of the canonical bytes, used as a log-safe package id.
    pub fn digest_hex(&self) -> String {
        hex::encode(Sha3_256::digest(&self.0))
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Canonicalize a package.
pub fn canonicalize(package: &FullAttestationPackage) -> Result<CanonicalBytes> {
    CanonicalBytes::new(package)
}
