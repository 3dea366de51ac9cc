//! Perceptual hashing of neutralized rasters.
//!
//! Perceptual hashes are corroborating evidence only: two renderings of the
//! same page hash to nearby values even after lossy re-encoding, so a
//! verifier can say "looks like the sealed document" when the cryptographic
//! hash no longer matches.
//!
//! # Usage
//!
//! ```no_run
//! use sealcodes_core::fingerprint::{ImageHasherBackend, PerceptualHash, PerceptualHasher};
//!
//! # fn example(a: &image::DynamicImage, b: &image::DynamicImage) -> sealcodes_core::Result<()> {
//! let hasher = ImageHasherBackend::default();
//! let first = PerceptualHash::from_hex(&hasher.p_hash(a)?)?;
//! let second = PerceptualHash::from_hex(&hasher.p_hash(b)?)?;
//! let similar = first.is_similar(&second, None)?;
//! # Ok(())
//! # }
//! ```

use image::DynamicImage;
use image_hasher::{HashAlg, Hasher, HasherConfig};

use crate::error::{Result, SealError};

/// Width and height of the hash grid (64 bits per hash).
pub const PERCEPTUAL_GRID: u32 = 8;

/// Default Hamming distance under which two hashes count as similar.
pub const DEFAULT_SIMILARITY_THRESHOLD: u32 = 10;

/// Source of the two perceptual hashes.
///
/// Output contract: lower-case hex, fixed length for a given implementation.
pub trait PerceptualHasher: Send + Sync {
    fn p_hash(&self, image: &DynamicImage) -> Result<String>;

    fn d_hash(&self, image: &DynamicImage) -> Result<String>;
}

/// `image_hasher` backed implementation: DCT mean hash and gradient hash.
pub struct ImageHasherBackend {
    p_hasher: Hasher,
    d_hasher: Hasher,
}

impl ImageHasherBackend {
    pub fn new() -> Self {
        Self {
            p_hasher: HasherConfig::new()
                .hash_size(PERCEPTUAL_GRID, PERCEPTUAL_GRID)
                .hash_alg(HashAlg::Mean)
                .preproc_dct()
                .to_hasher(),
            d_hasher: HasherConfig::new()
                .hash_size(PERCEPTUAL_GRID, PERCEPTUAL_GRID)
                .hash_alg(HashAlg::Gradient)
                .to_hasher(),
        }
    }
}

impl Default for ImageHasherBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ImageHasherBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageHasherBackend")
            .field("grid", &PERCEPTUAL_GRID)
            .finish()
    }
}

impl PerceptualHasher for ImageHasherBackend {
    fn p_hash(&self, image: &DynamicImage) -> Result<String> {
        Ok(hex::encode(self.p_hasher.hash_image(image).as_bytes()))
    }

    fn d_hash(&self, image: &DynamicImage) -> Result<String> {
        Ok(hex::encode(self.d_hasher.hash_image(image).as_bytes()))
    }
}

/// Decoded perceptual hash for comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerceptualHash {
    pub hash: Vec<u8>,
}

impl PerceptualHash {
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let hash = hex::decode(hex_str)
            .map_err(|e| SealError::SerializationError(format!("Invalid perceptual hash hex: {}", e)))?;
        Ok(Self { hash })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.hash)
    }

    pub fn hamming_distance(&self, other: &Self) -> Result<u32> {
        hamming_distance(&self.hash, &other.hash).ok_or_else(|| {
            SealError::SerializationError(format!(
                "Cannot compare perceptual hashes of {} and {} bytes",
                self.hash.len(),
                other.hash.len()
            ))
        })
    }

    /// `threshold` defaults to [`DEFAULT_SIMILARITY_THRESHOLD`].
    pub fn is_similar(&self, other: &Self, threshold: Option<u32>) -> Result<bool> {
        let threshold = threshold.unwrap_or(DEFAULT_SIMILARITY_THRESHOLD);
        Ok(self.hamming_distance(other)? <= threshold)
    }
}

/// Number of differing bits, or `None` when the inputs are empty or differ
/// in length (hashes from different algorithms are not comparable).
pub fn hamming_distance(hash1: &[u8], hash2: &[u8]) -> Option<u32> {
    if hash1.is_empty() || hash1.len() != hash2.len() {
        return None;
    }
    Some(
        hash1
            .iter()
            .zip(hash2.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum(),
    )
}

/// Outcome of comparing a recomputed fingerprint with an attested one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerceptualMatch {
    pub p_hash_distance: u32,
    pub d_hash_distance: u32,
}

impl PerceptualMatch {
    /// Compare hex hashes pairwise.
    pub fn compare(
        attested_p: &str,
        attested_d: &str,
        observed_p: &str,
        observed_d: &str,
    ) -> Result<Self> {
        let p = PerceptualHash::from_hex(attested_p)?
            .hamming_distance(&PerceptualHash::from_hex(observed_p)?)?;
        let d = PerceptualHash::from_hex(attested_d)?
            .hamming_distance(&PerceptualHash::from_hex(observed_d)?)?;
        Ok(Self {
            p_hash_distance: p,
            d_hash_distance: d,
        })
    }

    pub fn is_similar(&self, threshold: u32) -> bool {
        self.p_hash_distance <= threshold && self.d_hash_distance <= threshold
    }
}
