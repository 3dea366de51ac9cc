//! Fingerprint behavior on generated documents.
//!
//! Checks that drawing a seal inside the exclusion zone leaves every hash
//! untouched, that edits outside it change the cryptographic hash, and that
//! lossy re-encoding keeps the perceptual hashes close.
#![cfg(feature = "fingerprint")]

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

use sealcodes_core::fingerprint::{PerceptualMatch, DEFAULT_SIMILARITY_THRESHOLD};
use sealcodes_core::{compute_hashes, Document, ExclusionZone, FillColor, SealPlacement};

/// Gradient with a checker overlay so both hashes have structure to work on.
fn create_test_image(width: u32, height: u32) -> RgbImage {
    let mut img = ImageBuffer::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let r = ((x as f32 / width as f32) * 255.0) as u8;
        let g = ((y as f32 / height as f32) * 255.0) as u8;
        let b = (((x + y) as f32 / (width + height) as f32) * 200.0) as u8;
        let pattern = if (x / 20 + y / 20) % 2 == 0 { 30 } else { 0 };
        *pixel = Rgb([r.saturating_add(pattern), g, b]);
    }

    img
}

fn encode(img: &RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img.clone())
        .write_to(&mut buffer, format)
        .expect("encoding failed");
    buffer.into_inner()
}

fn jpeg(img: &RgbImage, quality: u8) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
    DynamicImage::ImageRgb8(img.clone())
        .write_with_encoder(encoder)
        .expect("JPEG encoding failed");
    buffer.into_inner()
}

/// Paint a fake QR seal into `zone`.
fn draw_seal(img: &mut RgbImage, zone: &ExclusionZone) {
    for y in zone.y..zone.bottom() {
        for x in zone.x..zone.right() {
            let dark = ((x - zone.x) / 4 + (y - zone.y) / 4) % 2 == 0;
            img.put_pixel(x, y, if dark { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) });
        }
    }
}

fn placement(width: u32, height: u32) -> ExclusionZone {
    SealPlacement::calculate(75.0, 75.0, 20.0, width, height, FillColor::white())
        .expect("placement")
        .exclusion_zone
}

// ============================================================================
// Exclusion zone
// ============================================================================

#[test]
fn test_sealed_png_hashes_like_original() {
    let original = create_test_image(400, 300);
    let zone = placement(400, 300);

    let mut sealed = original.clone();
    draw_seal(&mut sealed, &zone);

    let before = compute_hashes(&Document::new("image/png", encode(&original, ImageFormat::Png)), &zone)
        .expect("fingerprint original");
    let after = compute_hashes(&Document::new("image/png", encode(&sealed, ImageFormat::Png)), &zone)
        .expect("fingerprint sealed");

    assert_eq!(before, after, "drawing inside the zone must not change any hash");
}

#[test]
fn test_repeated_fingerprint_is_identical() {
    let doc = Document::new("image/png", encode(&create_test_image(200, 200), ImageFormat::Png));
    let zone = placement(200, 200);
    let a = compute_hashes(&doc, &zone).unwrap();
    let b = compute_hashes(&doc, &zone).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_pixel_outside_zone_changes_cryptographic_hash() {
    let original = create_test_image(400, 300);
    let zone = placement(400, 300);

    let mut edited = original.clone();
    let (x, y) = (zone.x - 1, zone.y);
    let Rgb([r, g, b]) = *edited.get_pixel(x, y);
    edited.put_pixel(x, y, Rgb([r ^ 1, g, b]));

    let before = compute_hashes(&Document::new("image/png", encode(&original, ImageFormat::Png)), &zone)
        .unwrap();
    let after = compute_hashes(&Document::new("image/png", encode(&edited, ImageFormat::Png)), &zone)
        .unwrap();

    assert_ne!(before.cryptographic, after.cryptographic);
}

#[test]
fn test_lossless_containers_agree() {
    let img = create_test_image(160, 120);
    let zone = placement(160, 120);

    let png = compute_hashes(&Document::new("image/png", encode(&img, ImageFormat::Png)), &zone).unwrap();
    let webp = compute_hashes(&Document::new("image/webp", encode(&img, ImageFormat::WebP)), &zone)
        .unwrap();

    assert_eq!(png, webp, "lossless containers decode to the same raster");
}

// ============================================================================
// Perceptual hashes
// ============================================================================

#[test]
fn test_jpeg_reencode_keeps_perceptual_hashes_close() {
    let img = create_test_image(400, 300);
    let zone = placement(400, 300);

    let png = compute_hashes(&Document::new("image/png", encode(&img, ImageFormat::Png)), &zone).unwrap();
    let jpg = compute_hashes(&Document::new("image/jpeg", jpeg(&img, 85)), &zone).unwrap();

    assert_ne!(png.cryptographic, jpg.cryptographic);

    let m = PerceptualMatch::compare(&png.p_hash, &png.d_hash, &jpg.p_hash, &jpg.d_hash).unwrap();
    assert!(
        m.is_similar(DEFAULT_SIMILARITY_THRESHOLD),
        "JPEG q85 drifted too far: {:?}",
        m
    );
}

#[test]
fn test_perceptual_hash_lengths_are_fixed() {
    let zone = ExclusionZone::new(0, 0, 10, 10, FillColor::white());
    let small = compute_hashes(
        &Document::new("image/png", encode(&create_test_image(64, 64), ImageFormat::Png)),
        &zone,
    )
    .unwrap();
    let large = compute_hashes(
        &Document::new("image/png", encode(&create_test_image(640, 480), ImageFormat::Png)),
        &zone,
    )
    .unwrap();

    assert_eq!(small.p_hash.len(), large.p_hash.len());
    assert_eq!(small.d_hash.len(), large.d_hash.len());
}
