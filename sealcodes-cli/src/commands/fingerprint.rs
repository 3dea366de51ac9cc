//! Fingerprint command implementation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use sealcodes_core::fingerprint::ImageRasterizer;
use sealcodes_core::{
    Document, DocumentHashes, ExclusionZone, FillColor, FingerprintEngine, Rasterizer,
    SealError, SealPlacement,
};
use tracing::{debug, info};

use crate::utils::{media_type_for, read_document, UsageError};
use crate::ZoneArgs;

/// Hashes of a document together with the zone they were computed with.
#[derive(Debug, Clone)]
pub struct Fingerprint {
    pub media_type: &'static str,
    pub width: u32,
    pub height: u32,
    pub exclusion_zone: ExclusionZone,
    pub hashes: DocumentHashes,
}

/// Rasterize `path`, resolve the seal zone against its first page, and hash it.
///
/// Runs on the blocking pool.
pub async fn fingerprint_file(path: &Path, zone: &ZoneArgs) -> Result<Fingerprint> {
    let media_type = media_type_for(path);
    let bytes = read_document(path)?;
    info!(path = %path.display(), bytes = bytes.len(), media_type, "Read document");

    let zone = zone.clone();
    tokio::task::spawn_blocking(move || {
        fingerprint_document(Document::new(media_type, bytes), media_type, &zone)
    })
    .await
    .context("Fingerprint task failed")?
}

fn fingerprint_document(
    document: Document,
    media_type: &'static str,
    args: &ZoneArgs,
) -> Result<Fingerprint> {
    let rasterizer = ImageRasterizer;
    if !rasterizer.supports(media_type) {
        let err = SealError::UnsupportedFormat(format!(
            "no rasterization path for media type '{}'",
            media_type
        ));
        return Err(anyhow::Error::new(err).context("Failed to fingerprint document"));
    }

    let fill = FillColor::parse(&args.fill)?;
    let raster = rasterizer
        .rasterize(&document)
        .context("Failed to fingerprint document")?;
    let (width, height) = raster.dimensions();

    let exclusion_zone = match (args.zone, args.placement) {
        (Some([x, y, w, h]), _) => ExclusionZone::new(x, y, w, h, fill),
        (None, Some([x_percent, y_percent, size_percent])) => {
            let placement =
                SealPlacement::calculate(x_percent, y_percent, size_percent, width, height, fill)?;
            debug!(size_px = placement.size_px, "Seal placed");
            placement.exclusion_zone
        }
        (None, None) => {
            return Err(UsageError::new("either --zone or --placement is required").into())
        }
    };

    let hashes = FingerprintEngine::new()
        .hash_raster(raster, &exclusion_zone)
        .context("Failed to fingerprint document")?;

    Ok(Fingerprint {
        media_type,
        width,
        height,
        exclusion_zone,
        hashes,
    })
}

/// Execute the fingerprint command.
pub async fn execute(file: PathBuf, zone: ZoneArgs, json: bool) -> Result<()> {
    let fingerprint = fingerprint_file(&file, &zone).await?;

    if json {
        let output = serde_json::json!({
            "mediaType": fingerprint.media_type,
            "width": fingerprint.width,
            "height": fingerprint.height,
            "exclusionZone": fingerprint.exclusion_zone,
            "hashes": fingerprint.hashes,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let zone = &fingerprint.exclusion_zone;
    println!();
    println!("{}", "Document fingerprint".bold());
    println!();
    println!("   {} {}", "File:".dimmed(), file.display());
    println!(
        "   {} {} ({}x{})",
        "Page:".dimmed(),
        fingerprint.media_type,
        fingerprint.width,
        fingerprint.height
    );
    println!(
        "   {} x={} y={} w={} h={} fill={}",
        "Exclusion zone:".dimmed(),
        zone.x,
        zone.y,
        zone.width,
        zone.height,
        zone.fill_color.as_str()
    );
    println!(
        "   {} {}",
        "SHA3-256:".dimmed(),
        fingerprint.hashes.cryptographic
    );
    println!("   {} {}", "pHash:".dimmed(), fingerprint.hashes.p_hash);
    println!("   {} {}", "dHash:".dimmed(), fingerprint.hashes.d_hash);

    Ok(())
}
