//! Client-side assembly of attestation packages.
//!
//! Every function here is pure. Timestamp and key id enter only through a
//! [`ServerAddendum`], which is derived from the signing service's response.

use crate::compact::CompactAttestationData;
use crate::error::{Result, SealError};
use crate::package::{
    DocumentHashes, ExclusionZone, FullAttestationPackage, Identity, ServerAddendum,
    SignatureEnvelope, SignedAttestation, UnsignedAttestationPackage,
};

/// Builder for [`UnsignedAttestationPackage`].
#[derive(Debug, Clone)]
pub struct AttestationBuilder {
    hashes: DocumentHashes,
    identity: Identity,
    exclusion_zone: ExclusionZone,
    user_url: Option<String>,
}

impl AttestationBuilder {
    pub fn new(hashes: DocumentHashes, identity: Identity, exclusion_zone: ExclusionZone) -> Self {
        Self {
            hashes,
            identity,
            exclusion_zone,
            user_url: None,
        }
    }

    /// Attach a URL the verifier can show next to the seal.
    pub fn with_user_url(mut self, url: impl Into<String>) -> Self {
        self.user_url = Some(url.into());
        self
    }

    pub fn build(self) -> UnsignedAttestationPackage {
        build_package(self.hashes, self.identity, self.exclusion_zone, self.user_url)
    }
}

pub fn build_package(
    hashes: DocumentHashes,
    identity: Identity,
    exclusion_zone: ExclusionZone,
    user_url: Option<String>,
) -> UnsignedAttestationPackage {
    UnsignedAttestationPackage {
        hashes,
        identity,
        exclusion_zone,
        user_url,
    }
}

/// Merge the signing service's output into the unsigned package.
///
/// Fails with `EnvelopeMismatch` when the addendum and envelope disagree on
/// timestamp or key id.
pub fn combine(
    unsigned: UnsignedAttestationPackage,
    addendum: ServerAddendum,
    envelope: &SignatureEnvelope,
) -> Result<SignedAttestation> {
    if addendum.timestamp != envelope.timestamp {
        return Err(SealError::EnvelopeMismatch(format!(
            "timestamp '{}' != '{}'",
            addendum.timestamp, envelope.timestamp
        )));
    }
    if addendum.service_info.public_key_id != envelope.public_key_id {
        return Err(SealError::EnvelopeMismatch(format!(
            "key id '{}' != '{}'",
            addendum.service_info.public_key_id, envelope.public_key_id
        )));
    }

    Ok(SignedAttestation {
        package: FullAttestationPackage::from_parts(unsigned, addendum),
        signature: envelope.signature.clone(),
    })
}

/// Shorthand for `combine(unsigned, ServerAddendum::from(envelope), envelope)`.
pub fn finalize(
    unsigned: UnsignedAttestationPackage,
    envelope: &SignatureEnvelope,
) -> Result<SignedAttestation> {
    combine(unsigned, ServerAddendum::from(envelope), envelope)
}

/// Encode a full package and its signature for embedding in a seal.
pub fn compact(package: &FullAttestationPackage, signature: &str) -> CompactAttestationData {
    CompactAttestationData::from_package(package, signature)
}

impl SignedAttestation {
    pub fn to_compact(&self) -> CompactAttestationData {
        compact(&self.package, &self.signature)
    }
}
