//! Inspect command implementation.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use sealcodes_core::CanonicalBytes;

use crate::utils::load_payload;

/// Execute the inspect command.
pub fn execute(payload: PathBuf, canonical_only: bool) -> Result<()> {
    let data = load_payload(&payload)?;
    let package = data
        .expand()
        .context("Failed to expand compact attestation")?;
    let canonical = CanonicalBytes::new(&package).context("Failed to canonicalize package")?;

    if canonical_only {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(canonical.as_bytes())
            .and_then(|_| stdout.write_all(b"\n"))
            .context("Failed to write canonical bytes")?;
        return Ok(());
    }

    println!();
    println!("{}", "Compact attestation".bold());
    println!();
    println!("   {} {}", "Format version:".dimmed(), data.version);
    println!("   {} {}", "Key id:".dimmed(), package.public_key_id());
    println!("   {} {}", "Timestamp:".dimmed(), package.timestamp);
    println!(
        "   {} {}:{}",
        "Identity:".dimmed(),
        package.identity.provider,
        package.identity.identifier
    );
    if let Some(url) = &package.user_url {
        println!("   {} {}", "User URL:".dimmed(), url);
    }
    match data.signature() {
        Some(signature) => println!("   {} {}", "Signature:".dimmed(), signature),
        None => println!("   {} {}", "Signature:".dimmed(), "missing".red()),
    }
    println!(
        "   {} {} bytes, SHA3-256 {}",
        "Canonical form:".dimmed(),
        canonical.len(),
        canonical.digest_hex()
    );
    println!();
    println!("{}", "Signed package".bold());
    println!();
    println!("{}", serde_json::to_string_pretty(&package)?);

    Ok(())
}
