//! Verify command implementation.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use sealcodes_core::fingerprint::PerceptualMatch;
use sealcodes_core::{
    compute_hashes, AttestationClient, AttestationClientConfig, CompactAttestationData, Document,
    DocumentHashes, InMemoryKeyRegistry, SignatureVerificationResult, SigningKeyRecord, Verifier,
};
use tracing::{debug, error, info};

use crate::utils::{load_payload, media_type_for, read_document};

/// Where the signing key comes from.
pub enum VerifyAgainst {
    /// A local SPKI PEM, registered under the payload's key id
    PublicKey {
        pem: PathBuf,
        valid_from: Option<String>,
        valid_until: Option<String>,
    },
    /// The remote verification service and its key registry
    Service { endpoint: String },
}

/// Result of re-fingerprinting the document with the attested zone.
///
/// Only the cryptographic hash decides. Perceptual distances are reported
/// alongside but never turn a changed document into a match.
#[derive(Debug, Clone, Copy)]
pub struct DocumentCheck {
    pub exact: bool,
    pub perceptual: PerceptualMatch,
    pub threshold: u32,
}

impl DocumentCheck {
    pub fn matches(&self) -> bool {
        self.exact
    }

    pub fn looks_similar(&self) -> bool {
        self.perceptual.is_similar(self.threshold)
    }
}

/// Execute the verify command.
pub async fn execute(
    payload: PathBuf,
    document: Option<PathBuf>,
    against: VerifyAgainst,
    threshold: u32,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let data = load_payload(&payload)?;
    info!(path = %payload.display(), key_id = %data.service.key_id, "Loaded payload");

    let result = match against {
        VerifyAgainst::PublicKey {
            pem,
            valid_from,
            valid_until,
        } => verify_offline(&data, &pem, valid_from.as_deref(), valid_until.as_deref()).await?,
        VerifyAgainst::Service { endpoint } => {
            info!(endpoint = %endpoint, "Verifying with verification service");
            AttestationClient::new(AttestationClientConfig::new(endpoint))
                .context("Failed to create verification service client")?
                .verify(&data)
                .await
                .context("Failed to reach verification service")?
        }
    };

    // The attested zone is only trustworthy once the signature checks out.
    let document_check = match &document {
        Some(path) if result.is_valid => Some(check_document(&data, path, threshold).await?),
        _ => None,
    };

    if json {
        let mut output = serde_json::to_value(&result)?;
        if let Some(check) = &document_check {
            output["document"] = serde_json::json!({
                "exactMatch": check.exact,
                "pHashDistance": check.perceptual.p_hash_distance,
                "dHashDistance": check.perceptual.d_hash_distance,
                "threshold": check.threshold,
                "perceptuallySimilar": check.looks_similar(),
                "matches": check.matches(),
            });
        }
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if !quiet {
        print_result(&result, document_check.as_ref());
    }

    if !result.is_valid {
        let code = result.failure().map(|f| f.code()).unwrap_or("Unknown");
        error!(code, "Attestation rejected");
        bail!("Attestation verification failed: {}", code);
    }
    if let Some(check) = document_check {
        if !check.matches() {
            error!(
                p_hash_distance = check.perceptual.p_hash_distance,
                d_hash_distance = check.perceptual.d_hash_distance,
                looks_similar = check.looks_similar(),
                "Document changed since sealing"
            );
            bail!("Document does not match the attested hashes");
        }
    }

    info!(key_id = %result.public_key_id, "Verification successful");
    Ok(())
}

async fn verify_offline(
    data: &CompactAttestationData,
    pem: &Path,
    valid_from: Option<&str>,
    valid_until: Option<&str>,
) -> Result<SignatureVerificationResult> {
    let public_key = std::fs::read_to_string(pem)
        .with_context(|| format!("Failed to read public key: {}", pem.display()))?;

    let created_at = match valid_from {
        Some(value) => parse_bound("--valid-from", value)?,
        None => DateTime::<Utc>::UNIX_EPOCH,
    };
    let mut record = SigningKeyRecord::ed25519(&data.service.key_id, public_key, created_at);
    if let Some(value) = valid_until {
        record = record.with_expiry(parse_bound("--valid-until", value)?);
    }
    debug!(key_id = %record.key_id, created_at = %record.created_at, "Registered offline key");

    let registry = InMemoryKeyRegistry::new().with_key(record);
    Verifier::new(registry)
        .verify(data)
        .await
        .context("Failed to verify attestation")
}

fn parse_bound(flag: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| crate::utils::UsageError::new(format!("{} '{}': {}", flag, value, e)).into())
}

async fn check_document(
    data: &CompactAttestationData,
    path: &Path,
    threshold: u32,
) -> Result<DocumentCheck> {
    let package = data
        .expand()
        .context("Failed to read attested exclusion zone")?;
    let attested = package.hashes;
    let zone = package.exclusion_zone;

    let media_type = media_type_for(path);
    let bytes = read_document(path)?;
    let observed: DocumentHashes = tokio::task::spawn_blocking(move || {
        compute_hashes(&Document::new(media_type, bytes), &zone)
    })
    .await
    .context("Fingerprint task failed")?
    .context("Failed to fingerprint document")?;

    let perceptual = PerceptualMatch::compare(
        &attested.p_hash,
        &attested.d_hash,
        &observed.p_hash,
        &observed.d_hash,
    )
    .context("Failed to compare perceptual hashes")?;

    let check = DocumentCheck {
        exact: attested.cryptographic == observed.cryptographic,
        perceptual,
        threshold,
    };
    debug!(
        exact = check.exact,
        p_hash_distance = perceptual.p_hash_distance,
        d_hash_distance = perceptual.d_hash_distance,
        "Document compared"
    );
    Ok(check)
}

fn print_result(result: &SignatureVerificationResult, document: Option<&DocumentCheck>) {
    let authentic = result.is_valid && document.map_or(true, DocumentCheck::matches);

    println!();
    if authentic {
        println!("{}", "╔════════════════════════════════════════╗".green());
        println!(
            "{}",
            "║              AUTHENTIC                 ║".green().bold()
        );
        println!("{}", "╚════════════════════════════════════════╝".green());
    } else {
        println!("{}", "╔════════════════════════════════════════╗".red());
        println!(
            "{}",
            "║              REJECTED                  ║".red().bold()
        );
        println!("{}", "╚════════════════════════════════════════╝".red());
    }
    println!();

    if result.is_valid {
        println!("   {} {}", "Signature:".dimmed(), "Valid (Ed25519)".green());
    } else {
        let reason = result.error.as_deref().unwrap_or("Unknown failure");
        println!("   {} {}", "Signature:".dimmed(), reason.red());
        if let Some(code) = result.failure() {
            println!("   {} {}", "Error code:".dimmed(), code.code());
        }
    }
    if let Some(details) = &result.details {
        println!(
            "   {} key found: {}, signature match: {}, timestamp valid: {}",
            "Checks:".dimmed(),
            details.key_found,
            details.signature_match,
            details.timestamp_valid
        );
    }
    println!(
        "   {} {}:{}",
        "Signed for:".dimmed(),
        result.identity.provider,
        result.identity.identifier
    );
    println!("   {} {}", "Key id:".dimmed(), result.public_key_id);
    println!("   {} {}", "Sealed at:".dimmed(), result.timestamp);

    if let Some(check) = document {
        let content = if check.exact {
            "Matches original".green()
        } else if check.looks_similar() {
            format!(
                "Content changed, looks similar (pHash {}, dHash {})",
                check.perceptual.p_hash_distance, check.perceptual.d_hash_distance
            )
            .yellow()
        } else {
            format!(
                "Content changed (pHash {}, dHash {}, threshold {})",
                check.perceptual.p_hash_distance,
                check.perceptual.d_hash_distance,
                check.threshold
            )
            .red()
        };
        println!("   {} {}", "Document:".dimmed(), content);
    }
    println!();
}
