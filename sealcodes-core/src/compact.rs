//! Compact attestation format embedded in the physical seal.
//!
//! ```text
//! {"v":1,"h":{"c":…,"p":{"p":…,"d":…}},"t":…,"i":{"p":…,"id":…},
//!  "s":{"k":…},"e":{"x":…,"y":…,"w":…,"h":…,"f":"RRGGBB"},"sig":…,"u":…}
//! ```
//!
//! Every canonical package field maps onto exactly one compact path, listed
//! in [`COMPACT_FIELD_MAP`]. The two envelope-only paths (`v`, `sig`) are
//! listed in [`COMPACT_ENVELOPE_FIELDS`]. Payloads without `v` are version 1.

use serde::{Deserialize, Serialize};

use crate::color::FillColor;
use crate::error::{Result, SealError};
use crate::package::{
    DocumentHashes, ExclusionZone, FullAttestationPackage, Identity, ServiceInfo,
};

pub const COMPACT_FORMAT_VERSION: u8 = 1;

/// `(compact path, canonical path)` for every field of a full package.
pub const COMPACT_FIELD_MAP: &[(&str, &str)] = &[
    ("h.c", "hashes.cryptographic"),
    ("h.p.p", "hashes.pHash"),
    ("h.p.d", "hashes.dHash"),
    ("i.p", "identity.provider"),
    ("i.id", "identity.identifier"),
    ("e.x", "exclusionZone.x"),
    ("e.y", "exclusionZone.y"),
    ("e.w", "exclusionZone.width"),
    ("e.h", "exclusionZone.height"),
    ("e.f", "exclusionZone.fillColor"),
    ("t", "timestamp"),
    ("s.k", "serviceInfo.publicKeyId"),
    ("u", "userUrl"),
];

/// Compact paths that carry no package field.
pub const COMPACT_ENVELOPE_FIELDS: &[&str] = &["v", "sig"];

pub fn canonical_path_for(compact_path: &str) -> Option<&'static str> {
    COMPACT_FIELD_MAP
        .iter()
        .find(|(c, _)| *c == compact_path)
        .map(|(_, full)| *full)
}

pub fn compact_path_for(canonical_path: &str) -> Option<&'static str> {
    COMPACT_FIELD_MAP
        .iter()
        .find(|(_, full)| *full == canonical_path)
        .map(|(c, _)| *c)
}

fn default_version() -> u8 {
    COMPACT_FORMAT_VERSION
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CompactPerceptual {
    #[serde(rename = "p")]
    pub p_hash: String,
    #[serde(rename = "d")]
    pub d_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CompactHashes {
    #[serde(rename = "c")]
    pub cryptographic: String,
    #[serde(rename = "p")]
    pub perceptual: CompactPerceptual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CompactIdentity {
    #[serde(rename = "p")]
    pub provider: String,
    #[serde(rename = "id")]
    pub identifier: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CompactService {
    #[serde(rename = "k", default)]
    pub key_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CompactZone {
    pub x: u32,
    pub y: u32,
    #[serde(rename = "w")]
    pub width: u32,
    #[serde(rename = "h")]
    pub height: u32,
    /// Fill color without the leading `#`
    #[serde(rename = "f")]
    pub fill_color: String,
}

/// Short-keyed encoding of a full package plus its signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CompactAttestationData {
    #[serde(rename = "v", default = "default_version")]
    pub version: u8,
    #[serde(rename = "h")]
    pub hashes: CompactHashes,
    #[serde(rename = "t")]
    pub timestamp: String,
    #[serde(rename = "i")]
    pub identity: CompactIdentity,
    #[serde(rename = "s", default)]
    pub service: CompactService,
    #[serde(rename = "e")]
    pub exclusion_zone: CompactZone,
    #[serde(rename = "sig", default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(rename = "u", default, skip_serializing_if = "Option::is_none")]
    pub user_url: Option<String>,
}

impl CompactAttestationData {
    pub fn from_package(package: &FullAttestationPackage, signature: &str) -> Self {
        Self {
            version: COMPACT_FORMAT_VERSION,
            hashes: CompactHashes {
                cryptographic: package.hashes.cryptographic.clone(),
                perceptual: CompactPerceptual {
                    p_hash: package.hashes.p_hash.clone(),
                    d_hash: package.hashes.d_hash.clone(),
                },
            },
            timestamp: package.timestamp.clone(),
            identity: CompactIdentity {
                provider: package.identity.provider.clone(),
                identifier: package.identity.identifier.clone(),
            },
            service: CompactService {
                key_id: package.service_info.public_key_id.clone(),
            },
            exclusion_zone: CompactZone {
                x: package.exclusion_zone.x,
                y: package.exclusion_zone.y,
                width: package.exclusion_zone.width,
                height: package.exclusion_zone.height,
                fill_color: package.exclusion_zone.fill_color.without_prefix().to_string(),
            },
            signature: Some(signature.to_string()),
            user_url: package.user_url.clone(),
        }
    }

    /// Rebuild the exact package that was canonicalized at signing time.
    pub fn expand(&self) -> Result<FullAttestationPackage> {
        self.check_version()?;
        let zone = &self.exclusion_zone;

        Ok(FullAttestationPackage {
            hashes: DocumentHashes {
                cryptographic: self.hashes.cryptographic.clone(),
                p_hash: self.hashes.perceptual.p_hash.clone(),
                d_hash: self.hashes.perceptual.d_hash.clone(),
            },
            identity: Identity {
                provider: self.identity.provider.clone(),
                identifier: self.identity.identifier.clone(),
            },
            exclusion_zone: ExclusionZone {
                x: zone.x,
                y: zone.y,
                width: zone.width,
                height: zone.height,
                fill_color: FillColor::from_compact(&zone.fill_color)?,
            },
            timestamp: self.timestamp.clone(),
            service_info: ServiceInfo {
                public_key_id: self.service.key_id.clone(),
            },
            user_url: self.user_url.clone(),
        })
    }

    pub fn check_version(&self) -> Result<()> {
        if self.version != COMPACT_FORMAT_VERSION {
            return Err(SealError::UnsupportedCompactVersion {
                version: self.version,
                current: COMPACT_FORMAT_VERSION,
            });
        }
        Ok(())
    }

    /// Signature, if present and non-empty.
    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref().filter(|s| !s.is_empty())
    }

    /// Key id, if present and non-empty.
    pub fn key_id(&self) -> Option<&str> {
        Some(self.service.key_id.as_str()).filter(|k| !k.is_empty())
    }

    /// Minified JSON, the literal seal payload.
    pub fn to_payload(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_payload(payload: &str) -> Result<Self> {
        let data: Self = serde_json::from_str(payload.trim())?;
        data.check_version()?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::CanonicalBytes;
    use proptest::prelude::*;
    use serde_json::Value;
    use std::collections::BTreeSet;

    fn leaf_paths(value: &Value, prefix: &str, out: &mut BTreeSet<String>) {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", prefix, key)
                    };
                    leaf_paths(child, &path, out);
                }
            }
            _ => {
                out.insert(prefix.to_string());
            }
        }
    }

    fn sample() -> FullAttestationPackage {
        FullAttestationPackage {
            hashes: DocumentHashes {
                cryptographic: "deadbeef".into(),
                p_hash: "0011223344556677".into(),
                d_hash: "8899aabbccddeeff".into(),
            },
            identity: Identity::new("google", "a@b.com"),
            exclusion_zone: ExclusionZone::new(5, 6, 70, 80, FillColor::parse("#00ff7f").unwrap()),
            timestamp: "2025-06-01T12:00:00.123Z".into(),
            service_info: ServiceInfo {
                public_key_id: "key-1".into(),
            },
            user_url: Some("https://seal.codes/u/a".into()),
        }
    }

    #[test]
    fn test_field_map_covers_every_canonical_field() {
        let pkg = sample();
        let mut canonical = BTreeSet::new();
        leaf_paths(&serde_json::to_value(&pkg).unwrap(), "", &mut canonical);

        let mapped: BTreeSet<String> =
            COMPACT_FIELD_MAP.iter().map(|(_, full)| full.to_string()).collect();
        assert_eq!(canonical, mapped);
        assert_eq!(mapped.len(), COMPACT_FIELD_MAP.len(), "duplicate canonical path");
    }

    #[test]
    fn test_field_map_covers_every_compact_field() {
        let data = CompactAttestationData::from_package(&sample(), "sig");
        let mut compact = BTreeSet::new();
        leaf_paths(&serde_json::to_value(&data).unwrap(), "", &mut compact);

        let mut mapped: BTreeSet<String> =
            COMPACT_FIELD_MAP.iter().map(|(c, _)| c.to_string()).collect();
        assert_eq!(mapped.len(), COMPACT_FIELD_MAP.len(), "duplicate compact path");
        mapped.extend(COMPACT_ENVELOPE_FIELDS.iter().map(|s| s.to_string()));
        assert_eq!(compact, mapped);
    }

    #[test]
    fn test_path_lookup_both_directions() {
        assert_eq!(canonical_path_for("e.f"), Some("exclusionZone.fillColor"));
        assert_eq!(compact_path_for("serviceInfo.publicKeyId"), Some("s.k"));
        assert_eq!(canonical_path_for("sig"), None);
    }

    #[test]
    fn test_color_stored_without_prefix() {
        let data = CompactAttestationData::from_package(&sample(), "sig");
        assert_eq!(data.exclusion_zone.fill_color, "00ff7f");
        assert_eq!(data.expand().unwrap().exclusion_zone.fill_color.as_str(), "#00ff7f");
    }

    #[test]
    fn test_payload_is_minified_and_parses_back() {
        let data = CompactAttestationData::from_package(&sample(), "sig");
        let payload = data.to_payload().unwrap();
        assert!(!payload.contains(' '));
        assert!(!payload.contains('\n'));
        assert!(payload.starts_with(r#"{"v":1,"h":{"c":"deadbeef""#));
        assert_eq!(CompactAttestationData::from_payload(&payload).unwrap(), data);
    }

    #[test]
    fn test_missing_version_is_v1() {
        let payload = r#"{"h":{"c":"a","p":{"p":"b","d":"c"}},"t":"2025-01-01T00:00:00.000Z",
            "i":{"p":"google","id":"a@b.com"},"s":{"k":"key-1"},
            "e":{"x":0,"y":0,"w":1,"h":1,"f":"FFFFFF"},"sig":"xyz"}"#;
        let data = CompactAttestationData::from_payload(payload).unwrap();
        assert_eq!(data.version, 1);
        assert_eq!(data.key_id(), Some("key-1"));
        assert_eq!(data.signature(), Some("xyz"));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut data = CompactAttestationData::from_package(&sample(), "sig");
        data.version = 2;
        assert!(matches!(
            data.expand(),
            Err(SealError::UnsupportedCompactVersion { version: 2, current: 1 })
        ));
        let payload = serde_json::to_string(&data).unwrap();
        assert!(CompactAttestationData::from_payload(&payload).is_err());
    }

    #[test]
    fn test_legacy_service_name_ignored() {
        let payload = r#"{"h":{"c":"a","p":{"p":"b","d":"c"}},"t":"t",
            "i":{"p":"google","id":"a@b.com"},"s":{"n":"seal.codes","k":"key-1"},
            "e":{"x":0,"y":0,"w":1,"h":1,"f":"FFFFFF"},"sig":"xyz"}"#;
        let data = CompactAttestationData::from_payload(payload).unwrap();
        assert_eq!(data.service.key_id, "key-1");
    }

    #[test]
    fn test_absent_and_empty_markers() {
        let payload = r#"{"h":{"c":"a","p":{"p":"b","d":"c"}},"t":"t",
            "i":{"p":"google","id":"a@b.com"},
            "e":{"x":0,"y":0,"w":1,"h":1,"f":"FFFFFF"},"sig":""}"#;
        let data = CompactAttestationData::from_payload(payload).unwrap();
        assert_eq!(data.signature(), None);
        assert_eq!(data.key_id(), None);
    }

    fn arb_color() -> impl Strategy<Value = FillColor> {
        any::<(u8, u8, u8)>().prop_map(|(r, g, b)| {
            FillColor::parse(&format!("{:02x}{:02x}{:02x}", r, g, b)).unwrap()
        })
    }

    prop_compose! {
        fn arb_package()(
            cryptographic in "[0-9a-f]{64}",
            p_hash in "[0-9a-f]{16}",
            d_hash in "[0-9a-f]{16}",
            provider in "[a-z]{1,10}",
            identifier in "[a-zA-Z0-9._%+-]{1,16}@[a-z0-9.-]{1,12}",
            (x, y, width, height) in any::<(u32, u32, u32, u32)>(),
            fill_color in arb_color(),
            timestamp in "20[0-9]{2}-[01][0-9]-[0-3][0-9]T[0-2][0-9]:[0-5][0-9]:[0-5][0-9]\\.[0-9]{3}Z",
            key_id in "[a-zA-Z0-9_-]{1,24}",
            user_url in proptest::option::of("\\PC{0,40}"),
        ) -> FullAttestationPackage {
            FullAttestationPackage {
                hashes: DocumentHashes { cryptographic, p_hash, d_hash },
                identity: Identity { provider, identifier },
                exclusion_zone: ExclusionZone { x, y, width, height, fill_color },
                timestamp,
                service_info: ServiceInfo { public_key_id: key_id },
                user_url,
            }
        }
    }

    proptest! {
        #[test]
        fn prop_expand_inverts_compact(pkg in arb_package(), sig in "[A-Za-z0-9+/]{1,88}={0,2}") {
            let data = CompactAttestationData::from_package(&pkg, &sig);
            let parsed = CompactAttestationData::from_payload(&data.to_payload().unwrap()).unwrap();
            prop_assert_eq!(parsed.signature(), Some(sig.as_str()));
            prop_assert_eq!(parsed.expand().unwrap(), pkg);
        }

        #[test]
        fn prop_canonical_bytes_survive_compact(pkg in arb_package()) {
            let before = CanonicalBytes::new(&pkg).unwrap();
            let data = CompactAttestationData::from_package(&pkg, "sig");
            let after = CanonicalBytes::new(&data.expand().unwrap()).unwrap();
            prop_assert_eq!(before, after);
        }
    }
}
