//! Fill color of the exclusion zone.
//!
//! The hex digits are kept exactly as the signer wrote them. Canonical bytes
//! are rebuilt from the compact form by re-adding the `#`, so any case folding
//! or shorthand expansion here would change what was signed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, SealError};

/// `#`-prefixed hex color, 3 or 6 digits, spelled as given.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FillColor(String);

impl FillColor {
    /// Parse `#RGB`, `#RRGGBB`, `RGB` or `RRGGBB`. Digits are not case-folded.
    pub fn parse(input: &str) -> Result<Self> {
        let digits = input.strip_prefix('#').unwrap_or(input);

        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(SealError::InvalidColor(format!(
                "'{}' contains non-hex characters",
                input
            )));
        }
        if digits.len() != 3 && digits.len() != 6 {
            return Err(SealError::InvalidColor(format!(
                "'{}' has {} hex digits, expected 3 or 6",
                input,
                digits.len()
            )));
        }

        Ok(Self(format!("#{}", digits)))
    }

    /// Rebuild from the compact form, which never carries the `#`.
    pub fn from_compact(digits: &str) -> Result<Self> {
        if digits.starts_with('#') {
            return Err(SealError::InvalidColor(format!(
                "compact color '{}' must not carry a '#' prefix",
                digits
            )));
        }
        Self::parse(digits)
    }

    /// Plain white, the default background for seals.
    pub fn white() -> Self {
        Self("#FFFFFF".to_string())
    }

    /// The `#`-prefixed form used in canonical bytes.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The form stored in compact attestations (no leading `#`).
    pub fn without_prefix(&self) -> &str {
        &self.0[1..]
    }

    /// Opaque RGBA pixel value for this color.
    pub fn rgba(&self) -> [u8; 4] {
        let digits = self.without_prefix().as_bytes();
        let nibble = |b: u8| (b as char).to_digit(16).unwrap_or(0) as u8;
        let channel = |i: usize| match digits.len() {
            3 => nibble(digits[i]) * 0x11,
            _ => nibble(digits[2 * i]) << 4 | nibble(digits[2 * i + 1]),
        };
        [channel(0), channel(1), channel(2), 0xFF]
    }
}

impl Default for FillColor {
    fn default() -> Self {
        Self::white()
    }
}

impl fmt::Display for FillColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FillColor {
    type Err = SealError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for FillColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for FillColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_digits_verbatim() {
        assert_eq!(FillColor::parse("#ffffff").unwrap().as_str(), "#ffffff");
        assert_eq!(FillColor::parse("a0B1c2").unwrap().as_str(), "#a0B1c2");
        assert_eq!(FillColor::parse("#FFF").unwrap().as_str(), "#FFF");
        assert_ne!(FillColor::parse("ffffff").unwrap(), FillColor::white());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(FillColor::parse("#GGGGGG").is_err());
        assert!(FillColor::parse("#FFFF").is_err());
        assert!(FillColor::parse("").is_err());
        assert!(FillColor::parse("#FFFFFFFF").is_err());
        assert!(FillColor::parse("##FFFFFF").is_err());
        assert!(FillColor::parse(" #FFFFFF").is_err());
    }

    #[test]
    fn test_prefix_round_trip() {
        for input in ["#12abEF", "#abc"] {
            let color = FillColor::parse(input).unwrap();
            assert_eq!(FillColor::parse(color.without_prefix()).unwrap(), color);
            assert_eq!(format!("#{}", color.without_prefix()), input);
        }
    }

    #[test]
    fn test_from_compact_rejects_prefix() {
        assert_eq!(FillColor::from_compact("ffffff").unwrap().as_str(), "#ffffff");
        assert!(FillColor::from_compact("#ffffff").is_err());
    }

    #[test]
    fn test_rgba() {
        assert_eq!(FillColor::parse("#FF8000").unwrap().rgba(), [255, 128, 0, 255]);
        assert_eq!(FillColor::parse("#ff8000").unwrap().rgba(), [255, 128, 0, 255]);
        assert_eq!(FillColor::parse("f80").unwrap().rgba(), [255, 136, 0, 255]);
        assert_eq!(FillColor::white().rgba(), [255, 255, 255, 255]);
    }

    #[test]
    fn test_serde_preserves_spelling() {
        let color: FillColor = serde_json::from_str("\"#abc\"").unwrap();
        assert_eq!(color.as_str(), "#abc");
        assert_eq!(serde_json::to_string(&color).unwrap(), "\"#abc\"");
        assert!(serde_json::from_str::<FillColor>("\"nope\"").is_err());
    }
}
