//! Keygen command implementation.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use colored::Colorize;
use sealcodes_core::Ed25519Signer;
use tracing::info;

/// Private and public key paths for `key_id` inside `dir`.
pub fn key_paths(dir: &Path, key_id: &str) -> (PathBuf, PathBuf) {
    (
        dir.join(format!("{}.key.pem", key_id)),
        dir.join(format!("{}.pub.pem", key_id)),
    )
}

/// Execute the keygen command.
pub fn execute(key_id: String, out_dir: PathBuf, force: bool, quiet: bool) -> Result<()> {
    if key_id.trim().is_empty() || key_id.contains(['/', '\\']) {
        bail!("Invalid key id '{}'", key_id);
    }

    let (private_path, public_path) = key_paths(&out_dir, &key_id);
    if !force {
        for path in [&private_path, &public_path] {
            if path.exists() {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
        }
    }

    let signer = Ed25519Signer::generate(key_id.clone());
    let private_pem = signer.private_key_pem()?;
    let public_pem = signer.public_key_pem()?;

    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to write key directory: {}", out_dir.display()))?;
    write_private(&private_path, private_pem.as_bytes())?;
    std::fs::write(&public_path, public_pem.as_bytes())
        .with_context(|| format!("Failed to write public key: {}", public_path.display()))?;

    info!(key_id = %key_id, path = %public_path.display(), "Generated Ed25519 key pair");

    if !quiet {
        println!();
        println!("{}", "Ed25519 key pair generated".green().bold());
        println!();
        println!("   {} {}", "Key id:".dimmed(), key_id);
        println!("   {} {}", "Private key:".dimmed(), private_path.display());
        println!("   {} {}", "Public key:".dimmed(), public_path.display());
        println!();
        println!(
            "   Publish the public key under id '{}' in the key registry before",
            key_id
        );
        println!("   serving attestations signed with it.");
    }

    Ok(())
}

#[cfg(unix)]
fn write_private(path: &Path, pem: &[u8]) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .with_context(|| format!("Failed to write private key: {}", path.display()))?;
    file.write_all(pem)
        .with_context(|| format!("Failed to write private key: {}", path.display()))
}

#[cfg(not(unix))]
fn write_private(path: &Path, pem: &[u8]) -> Result<()> {
    std::fs::write(path, pem)
        .with_context(|| format!("Failed to write private key: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_paths() {
        let (private, public) = key_paths(Path::new("/keys"), "seal-2025");
        assert_eq!(private, PathBuf::from("/keys/seal-2025.key.pem"));
        assert_eq!(public, PathBuf::from("/keys/seal-2025.pub.pem"));
    }
}
