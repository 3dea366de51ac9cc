//! Common utility functions shared across CLI commands.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sealcodes_core::CompactAttestationData;
use tracing::debug;

/// Invalid combination of arguments that clap cannot express.
#[derive(Debug)]
pub struct UsageError(String);

impl UsageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for UsageError {}

/// Build the payload output path from the document path.
///
/// Transforms `file.ext` into `file.ext.seal.json`.
pub fn build_payload_path(file: &Path) -> PathBuf {
    let mut name = file.file_name().unwrap_or_default().to_os_string();
    name.push(".seal.json");
    file.with_file_name(name)
}

/// MIME type from the file extension.
pub fn media_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Read a document to fingerprint.
/// Leading characters of a hex digest for display, or the whole digest if shorter.
pub fn short_digest(digest: &str) -> &str {
    digest.get(..16).unwrap_or(digest)
}

pub fn read_document(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))
}

/// Load a compact payload (the JSON string embedded in a QR seal).
pub fn load_payload(path: &Path) -> Result<CompactAttestationData> {
    let payload = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload file: {}", path.display()))?;
    let data = CompactAttestationData::from_payload(payload.trim())
        .context("Failed to parse compact attestation payload")?;
    debug!(version = data.version, key_id = %data.service.key_id, "Parsed payload");
    Ok(data)
}

/// Parse `X,Y,W,H` in pixels.
pub fn parse_rect(value: &str) -> std::result::Result<[u32; 4], String> {
    let parts = split_numbers::<u32>(value, 4)?;
    Ok([parts[0], parts[1], parts[2], parts[3]])
}

/// Parse `X%,Y%,SIZE%`. The `%` signs are optional.
pub fn parse_placement(value: &str) -> std::result::Result<[f64; 3], String> {
    let parts = split_numbers::<f64>(value, 3)?;
    Ok([parts[0], parts[1], parts[2]])
}

fn split_numbers<T: std::str::FromStr>(
    value: &str,
    expected: usize,
) -> std::result::Result<Vec<T>, String> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != expected {
        return Err(format!(
            "expected {} comma-separated numbers, got {}",
            expected,
            parts.len()
        ));
    }
    parts
        .into_iter()
        .map(|p| {
            p.trim_end_matches('%')
                .parse::<T>()
                .map_err(|_| format!("'{}' is not a valid number", p))
        })
        .collect()
}
