//! Seal command implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use colored::Colorize;
use sealcodes_core::{
    finalize, AttestationBuilder, AttestationClient, AttestationClientConfig,
    AuthenticatedIdentity, Ed25519Signer, Identity, SignatureEnvelope, SigningService,
    UnsignedAttestationPackage,
};
use tracing::{debug, info, warn};

use crate::commands::fingerprint::fingerprint_file;
use crate::utils::{build_payload_path, short_digest};
use crate::ZoneArgs;

/// Who signs the attestation.
pub enum SignWith {
    /// The remote signing service, authenticated with a bearer token
    Service { endpoint: String, token: String },
    /// A local PKCS#8 key; the caller is trusted to be `--email`
    LocalKey { pem: PathBuf, key_id: String },
}

pub struct SealArgs {
    pub file: PathBuf,
    pub zone: ZoneArgs,
    pub provider: String,
    pub email: String,
    pub user_url: Option<String>,
    pub signer: SignWith,
    pub output: Option<PathBuf>,
    pub quiet: bool,
}

/// Execute the seal command.
pub async fn execute(args: SealArgs) -> Result<()> {
    let fingerprint = fingerprint_file(&args.file, &args.zone).await?;

    let mut builder = AttestationBuilder::new(
        fingerprint.hashes,
        Identity::new(&args.provider, &args.email),
        fingerprint.exclusion_zone,
    );
    if let Some(url) = &args.user_url {
        builder = builder.with_user_url(url);
    }
    let unsigned = builder.build();

    let envelope = match &args.signer {
        SignWith::Service { endpoint, token } => sign_remote(&unsigned, endpoint, token).await?,
        SignWith::LocalKey { pem, key_id } => {
            sign_local(&unsigned, pem, key_id, &args.provider, &args.email)?
        }
    };
    debug!(key_id = %envelope.public_key_id, timestamp = %envelope.timestamp, "Received signature");

    let signed = finalize(unsigned, &envelope).context("Failed to assemble attestation")?;
    let payload = signed
        .to_compact()
        .to_payload()
        .context("Failed to encode compact payload")?;

    let payload_path = args
        .output
        .clone()
        .unwrap_or_else(|| build_payload_path(&args.file));
    std::fs::write(&payload_path, &payload)
        .with_context(|| format!("Failed to write payload: {}", payload_path.display()))?;

    info!(path = %payload_path.display(), bytes = payload.len(), "Payload saved");

    if !args.quiet {
        println!();
        println!("{}", "Document sealed".green().bold());
        println!();
        println!("   {} {}", "Payload saved:".dimmed(), payload_path.display());
        println!(
            "   {} {}:{}",
            "Signed for:".dimmed(),
            args.provider,
            args.email
        );
        println!("   {} {}", "Key id:".dimmed(), envelope.public_key_id);
        println!("   {} {}", "Timestamp:".dimmed(), envelope.timestamp);
        println!(
            "   {} {}",
            "Document hash:".dimmed(),
            short_digest(&signed.package.hashes.cryptographic)
        );
        println!("   {} {} bytes", "Payload size:".dimmed(), payload.len());
    }

    Ok(())
}

async fn sign_remote(
    unsigned: &UnsignedAttestationPackage,
    endpoint: &str,
    token: &str,
) -> Result<SignatureEnvelope> {
    info!(endpoint = %endpoint, "Requesting signature from signing service");
    let client = AttestationClient::new(AttestationClientConfig::new(endpoint))
        .context("Failed to create signing service client")?;
    client
        .sign(unsigned, token)
        .await
        .context("Failed to sign attestation")
}

fn sign_local(
    unsigned: &UnsignedAttestationPackage,
    pem: &Path,
    key_id: &str,
    provider: &str,
    email: &str,
) -> Result<SignatureEnvelope> {
    warn!(key_id = %key_id, "Signing locally; identity is not authenticated");
    let pem = std::fs::read_to_string(pem)
        .with_context(|| format!("Failed to read signing key: {}", pem.display()))?;
    let signer = Ed25519Signer::from_pkcs8_pem(key_id, &pem).context("Invalid signing key")?;

    let caller = AuthenticatedIdentity {
        email: email.to_string(),
        provider: provider.to_string(),
    };
    SigningService::new(Arc::new(signer))
        .sign(unsigned.clone(), &caller, Utc::now())
        .context("Failed to sign attestation")
}
