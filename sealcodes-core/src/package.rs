//! Attestation data model.
//!
//! The field declaration order of every struct here is load-bearing: it is the
//! order in which [`crate::canonical::CanonicalBytes`] emits the fields. Do not
//! reorder fields without bumping the compact format version.

use serde::{Deserialize, Serialize};

use crate::color::FillColor;

/// A document handed to the fingerprint engine.
#[derive(Debug, Clone)]
pub struct Document {
    /// MIME type, e.g. `image/png` or `application/pdf`
    pub media_type: String,
    /// Raw container bytes
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            media_type: media_type.into(),
            bytes,
        }
    }
}

/// Pixel-space rectangle on the first page/frame reserved for the seal.
///
/// The same rectangle is used for hashing and for placing the seal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ExclusionZone {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// `#RRGGBB`
    #[cfg_attr(feature = "openapi", schema(value_type = String, example = "#FFFFFF"))]
    pub fill_color: FillColor,
}

impl ExclusionZone {
    pub fn new(x: u32, y: u32, width: u32, height: u32, fill_color: FillColor) -> Self {
        Self {
            x,
            y,
            width,
            height,
            fill_color,
        }
    }

    /// Exclusive right edge, saturating on overflow.
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// Exclusive bottom edge, saturating on overflow.
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether the pixel at `(px, py)` lies inside the zone.
    pub fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    /// Whether the zone fits entirely inside a `width` x `height` raster.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        (self.x as u64 + self.width as u64) <= width as u64
            && (self.y as u64 + self.height as u64) <= height as u64
    }
}

/// Cryptographic and perceptual fingerprints of a neutralized document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DocumentHashes {
    /// Lower-case hex SHA3-256
    pub cryptographic: String,
    pub p_hash: String,
    pub d_hash: String,
}

/// OAuth provider name and account identifier (usually an email).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Identity {
    pub provider: String,
    pub identifier: String,
}

impl Identity {
    pub fn new(provider: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            identifier: identifier.into(),
        }
    }
}

/// Package assembled by the client before signing.
///
/// There is no timestamp or key id field: those are server-assigned and the
/// type cannot carry them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct UnsignedAttestationPackage {
    pub hashes: DocumentHashes,
    pub identity: Identity,
    pub exclusion_zone: ExclusionZone,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    pub public_key_id: String,
}

/// Fields only the signing service may set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ServerAddendum {
    /// ISO-8601, millisecond precision, `Z` suffix
    pub timestamp: String,
    pub service_info: ServiceInfo,
}

impl From<&SignatureEnvelope> for ServerAddendum {
    fn from(envelope: &SignatureEnvelope) -> Self {
        Self {
            timestamp: envelope.timestamp.clone(),
            service_info: ServiceInfo {
                public_key_id: envelope.public_key_id.clone(),
            },
        }
    }
}

/// The exact object whose canonical bytes are signed and re-verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct FullAttestationPackage {
    pub hashes: DocumentHashes,
    pub identity: Identity,
    pub exclusion_zone: ExclusionZone,
    pub timestamp: String,
    pub service_info: ServiceInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_url: Option<String>,
}

impl FullAttestationPackage {
    pub fn from_parts(unsigned: UnsignedAttestationPackage, addendum: ServerAddendum) -> Self {
        Self {
            hashes: unsigned.hashes,
            identity: unsigned.identity,
            exclusion_zone: unsigned.exclusion_zone,
            timestamp: addendum.timestamp,
            service_info: addendum.service_info,
            user_url: unsigned.user_url,
        }
    }

    pub fn public_key_id(&self) -> &str {
        &self.service_info.public_key_id
    }
}

/// Signing service response.
///
/// `public_key` is informational only; verifiers resolve keys by
/// `public_key_id` through the key registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct SignatureEnvelope {
    pub timestamp: String,
    /// Base64 (standard alphabet) signature over the canonical bytes
    pub signature: String,
    /// Base64 (standard alphabet) raw public key
    pub public_key: String,
    pub public_key_id: String,
}

/// A full package together with its signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedAttestation {
    pub package: FullAttestationPackage,
    pub signature: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone() -> ExclusionZone {
        ExclusionZone::new(10, 20, 30, 40, FillColor::white())
    }

    #[test]
    fn test_zone_edges() {
        let z = zone();
        assert_eq!(z.right(), 40);
        assert_eq!(z.bottom(), 60);
        assert!(z.contains(10, 20));
        assert!(z.contains(39, 59));
        assert!(!z.contains(40, 59));
        assert!(!z.contains(9, 20));
    }

    #[test]
    fn test_zone_fits_within() {
        let z = zone();
        assert!(z.fits_within(40, 60));
        assert!(!z.fits_within(39, 60));
        assert!(!ExclusionZone::new(u32::MAX, 0, 2, 1, FillColor::white()).fits_within(u32::MAX, 1));
    }

    #[test]
    fn test_unsigned_package_ignores_server_fields() {
        let json = r##"{
            "hashes": {"cryptographic": "aa", "pHash": "bb", "dHash": "cc"},
            "identity": {"provider": "google", "identifier": "a@b.com"},
            "exclusionZone": {"x": 0, "y": 0, "width": 1, "height": 1, "fillColor": "#fff"},
            "timestamp": "1999-01-01T00:00:00.000Z",
            "serviceInfo": {"publicKeyId": "attacker"}
        }"##;
        let pkg: UnsignedAttestationPackage = serde_json::from_str(json).unwrap();
        assert_eq!(pkg.exclusion_zone.fill_color.as_str(), "#fff");
        let out = serde_json::to_string(&pkg).unwrap();
        assert!(!out.contains("timestamp"));
        assert!(!out.contains("attacker"));
    }

    #[test]
    fn test_addendum_from_envelope() {
        let envelope = SignatureEnvelope {
            timestamp: "2025-01-01T00:00:00.000Z".into(),
            signature: "c2ln".into(),
            public_key: "cGs=".into(),
            public_key_id: "key-1".into(),
        };
        let addendum = ServerAddendum::from(&envelope);
        assert_eq!(addendum.timestamp, envelope.timestamp);
        assert_eq!(addendum.service_info.public_key_id, "key-1");
    }
}
