//! Document fingerprinting with an exclusion zone.
//!
//! The first page/frame of the document is rasterized to RGBA8, every pixel
//! of the exclusion zone is painted with the zone's fill color, and the
//! neutralized raster is hashed. Drawing the seal inside the zone later does
//! not change any of the three hashes.
//!
//! `cryptographic` is SHA3-256 over a fixed raster encoding, so it does not
//! depend on the container format or its compression settings:
//!
//! ```text
//! "sealcodes-raster-v1" || width (u32 BE) || height (u32 BE) || RGBA bytes
//! ```

pub mod perceptual;

use image::RgbaImage;
use sha3::{Digest, Sha3_256};

use crate::error::{Result, SealError};
use crate::package::{Document, DocumentHashes, ExclusionZone};

pub use perceptual::{
    hamming_distance, ImageHasherBackend, PerceptualHash, PerceptualHasher, PerceptualMatch,
    DEFAULT_SIMILARITY_THRESHOLD,
};

const RASTER_DOMAIN: &[u8] = b"sealcodes-raster-v1";

/// Turns a document's first page/frame into pixels.
pub trait Rasterizer: Send + Sync {
    fn supports(&self, media_type: &str) -> bool;

    fn rasterize(&self, document: &Document) -> Result<RgbaImage>;
}

/// Built-in path for `image/*` (PNG, JPEG, GIF, WebP). Animated formats use
/// the first frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageRasterizer;

impl Rasterizer for ImageRasterizer {
    fn supports(&self, media_type: &str) -> bool {
        media_type.trim().to_ascii_lowercase().starts_with("image/")
    }

    fn rasterize(&self, document: &Document) -> Result<RgbaImage> {
        let image = image::load_from_memory(&document.bytes).map_err(|e| {
            SealError::UnsupportedFormat(format!(
                "could not decode {} document: {}",
                document.media_type, e
            ))
        })?;
        Ok(image.to_rgba8())
    }
}

pub struct FingerprintEngine {
    rasterizers: Vec<Box<dyn Rasterizer>>,
    hasher: Box<dyn PerceptualHasher>,
}

impl FingerprintEngine {
    /// Engine with the built-in image rasterizer and `image_hasher` backend.
    pub fn new() -> Self {
        Self {
            rasterizers: vec![Box::new(ImageRasterizer)],
            hasher: Box::new(ImageHasherBackend::default()),
        }
    }

    /// Register a rasterizer, e.g. a PDF renderer. Later registrations take
    /// precedence over earlier ones.
    pub fn with_rasterizer(mut self, rasterizer: impl Rasterizer + 'static) -> Self {
        self.rasterizers.insert(0, Box::new(rasterizer));
        self
    }

    pub fn with_perceptual_hasher(mut self, hasher: impl PerceptualHasher + 'static) -> Self {
        self.hasher = Box::new(hasher);
        self
    }

    pub fn supports(&self, media_type: &str) -> bool {
        self.rasterizers.iter().any(|r| r.supports(media_type))
    }

    pub fn compute_hashes(
        &self,
        document: &Document,
        exclusion_zone: &ExclusionZone,
    ) -> Result<DocumentHashes> {
        let rasterizer = self
            .rasterizers
            .iter()
            .find(|r| r.supports(&document.media_type))
            .ok_or_else(|| {
                SealError::UnsupportedFormat(format!(
                    "no rasterization path for media type '{}'",
                    document.media_type
                ))
            })?;

        let raster = rasterizer.rasterize(document)?;
        self.hash_raster(raster, exclusion_zone)
    }

    /// Hash an already rasterized first page.
    pub fn hash_raster(
        &self,
        mut raster: RgbaImage,
        exclusion_zone: &ExclusionZone,
    ) -> Result<DocumentHashes> {
        neutralize(&mut raster, exclusion_zone)?;

        let (width, height) = raster.dimensions();
        let cryptographic = raster_digest(&raster);
        let image = image::DynamicImage::ImageRgba8(raster);
        let hashes = DocumentHashes {
            cryptographic,
            p_hash: self.hasher.p_hash(&image)?,
            d_hash: self.hasher.d_hash(&image)?,
        };

        tracing::debug!(
            width,
            height,
            cryptographic = %hashes.cryptographic,
            "Document fingerprinted"
        );
        Ok(hashes)
    }
}

impl Default for FingerprintEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FingerprintEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintEngine")
            .field("rasterizers", &self.rasterizers.len())
            .finish_non_exhaustive()
    }
}

/// Fingerprint with the default engine.
pub fn compute_hashes(document: &Document, exclusion_zone: &ExclusionZone) -> Result<DocumentHashes> {
    FingerprintEngine::new().compute_hashes(document, exclusion_zone)
}

/// Paint the exclusion zone with its fill color.
pub fn neutralize(raster: &mut RgbaImage, zone: &ExclusionZone) -> Result<()> {
    let (width, height) = raster.dimensions();
    if zone.is_empty() {
        return Err(SealError::GeometryOutOfBounds(format!(
            "exclusion zone {}x{} has zero area",
            zone.width, zone.height
        )));
    }
    if !zone.fits_within(width, height) {
        return Err(SealError::GeometryOutOfBounds(format!(
            "exclusion zone ({}, {}, {}x{}) exceeds document {}x{}",
            zone.x, zone.y, zone.width, zone.height, width, height
        )));
    }

    let fill = image::Rgba(zone.fill_color.rgba());
    for y in zone.y..zone.bottom() {
        for x in zone.x..zone.right() {
            raster.put_pixel(x, y, fill);
        }
    }
    Ok(())
}

/// Lower-case hex SHA3-256 of the domain-separated raster encoding.
pub fn raster_digest(raster: &RgbaImage) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(RASTER_DOMAIN);
    hasher.update(raster.width().to_be_bytes());
    hasher.update(raster.height().to_be_bytes());
    hasher.update(raster.as_raw());
    hex::encode(hasher.finalize())
}
