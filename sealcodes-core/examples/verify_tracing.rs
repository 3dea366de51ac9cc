//! Example demonstrating signing and verification tracing instrumentation.
//!
//! Run with: cargo run -p sealcodes-core --example verify_tracing

use std::sync::Arc;

use chrono::Utc;
use sealcodes_core::{
    finalize, AttestationBuilder, AuthenticatedIdentity, DocumentHashes, Ed25519Signer,
    ExclusionZone, FillColor, Identity, InMemoryKeyRegistry, SigningKeyRecord, SigningService,
    Verifier,
};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(EnvFilter::new("sealcodes_core=debug,info"))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    println!("=== Attestation Tracing Demo ===\n");

    let signer = Arc::new(Ed25519Signer::generate("demo-key"));
    let public_key = match signer.public_key_pem() {
        Ok(pem) => pem,
        Err(e) => {
            eprintln!("Failed to encode public key: {}", e);
            return;
        }
    };
    let registry = InMemoryKeyRegistry::new().with_key(SigningKeyRecord::ed25519(
        "demo-key",
        public_key,
        Utc::now() - chrono::Duration::minutes(1),
    ));

    let unsigned = AttestationBuilder::new(
        DocumentHashes {
            cryptographic: "ab".repeat(32),
            p_hash: "0123456789abcdef".into(),
            d_hash: "fedcba9876543210".into(),
        },
        Identity::new("google", "a@b.com"),
        ExclusionZone::new(0, 0, 100, 100, FillColor::white()),
    )
    .build();

    let caller = AuthenticatedIdentity {
        email: "a@b.com".into(),
        provider: "google".into(),
    };

    println!("Signing...\n");
    let compact = match SigningService::new(signer)
        .sign(unsigned.clone(), &caller, Utc::now())
        .and_then(|envelope| finalize(unsigned, &envelope))
    {
        Ok(signed) => signed.to_compact(),
        Err(e) => {
            eprintln!("Failed to sign: {}", e);
            return;
        }
    };

    let verifier = Verifier::new(registry);

    println!("\nVerifying original...\n");
    match verifier.verify(&compact).await {
        Ok(result) => println!("\n   valid: {}\n", result.is_valid),
        Err(e) => println!("\n   error: {}\n", e),
    }

    println!("Verifying with identifier changed to c@d.com...\n");
    let mut tampered = compact;
    tampered.identity.identifier = "c@d.com".into();
    match verifier.verify(&tampered).await {
        Ok(result) => println!(
            "\n   valid: {} ({})",
            result.is_valid,
            result.failure().map(|f| f.code()).unwrap_or("-")
        ),
        Err(e) => println!("\n   error: {}", e),
    }
}
