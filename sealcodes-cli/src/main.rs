//! seal.codes CLI - fingerprint, seal and verify documents.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Usage error
  65  Verification failed (attestation rejected or document changed)
  66  Input file missing or unreadable
  69  Signing/verification service unavailable
  74  Could not write output";

#[derive(Parser)]
#[command(name = "sealcodes")]
#[command(author, version, about = "Signed, verifiable seals for documents", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Log progress to stderr (-vv for debug output)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where the seal goes on the first page.
#[derive(Args, Debug, Clone)]
pub struct ZoneArgs {
    /// Exclusion zone in pixels
    #[arg(
        long,
        value_name = "X,Y,W,H",
        value_parser = utils::parse_rect,
        required_unless_present = "placement",
        conflicts_with = "placement"
    )]
    pub zone: Option<[u32; 4]>,

    /// Square seal placed by percentage of the page (size is a percentage of the shorter side)
    #[arg(long, value_name = "X%,Y%,SIZE%", value_parser = utils::parse_placement)]
    pub placement: Option<[f64; 3]>,

    /// Color painted over the zone before hashing
    #[arg(long, value_name = "#RRGGBB", default_value = "#FFFFFF")]
    pub fill: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an Ed25519 signing key pair (PKCS#8 private key, SPKI public key)
    Keygen {
        /// Key id published in the key registry and carried by attestations
        #[arg(long, default_value = "default")]
        key_id: String,

        /// Directory to write `<KEY_ID>.key.pem` and `<KEY_ID>.pub.pem` into
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        out_dir: PathBuf,

        /// Overwrite existing key files
        #[arg(long)]
        force: bool,
    },

    /// Compute the document hashes with the seal area neutralized
    Fingerprint {
        /// Document to fingerprint (PNG, JPEG, GIF, WebP)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[command(flatten)]
        zone: ZoneArgs,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Fingerprint a document, have the attestation signed, and write the compact payload
    Seal {
        /// Document to seal
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[command(flatten)]
        zone: ZoneArgs,

        /// OAuth provider of the signer's identity
        #[arg(long)]
        provider: String,

        /// Email (account identifier) of the signer
        #[arg(long)]
        email: String,

        /// Optional link embedded in the attestation
        #[arg(long)]
        user_url: Option<String>,

        /// Signing service root URL
        #[arg(long, env = "SEALCODES_ENDPOINT")]
        endpoint: Option<String>,

        /// Bearer token for the signing service
        #[arg(long, env = "SEALCODES_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Sign locally with this PKCS#8 private key (takes precedence over --endpoint)
        #[arg(long, value_name = "PEM")]
        signing_key: Option<PathBuf>,

        /// Key id used with --signing-key
        #[arg(long, default_value = "default", requires = "signing_key")]
        key_id: String,

        /// Output path (defaults to <FILE>.seal.json)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Verify a compact attestation payload
    Verify {
        /// Compact payload written by `seal` or scanned from a QR seal
        #[arg(value_name = "PAYLOAD")]
        payload: PathBuf,

        /// Also check that this document still matches the attested hashes
        #[arg(long, value_name = "FILE")]
        document: Option<PathBuf>,

        /// Verify offline against this SPKI public key (takes precedence over --endpoint)
        #[arg(long, value_name = "PEM")]
        public_key: Option<PathBuf>,

        /// Start of the offline key's validity window (RFC 3339)
        #[arg(long, requires = "public_key")]
        valid_from: Option<String>,

        /// End of the offline key's validity window (RFC 3339)
        #[arg(long, requires = "public_key")]
        valid_until: Option<String>,

        /// Verification service root URL
        #[arg(long, env = "SEALCODES_ENDPOINT")]
        endpoint: Option<String>,

        /// Perceptual distance reported as "looks similar" for a changed --document
        #[arg(long, default_value_t = sealcodes_core::fingerprint::DEFAULT_SIMILARITY_THRESHOLD)]
        threshold: u32,

        /// Print the verification result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decode a compact payload and show the signed package
    Inspect {
        /// Compact payload to decode
        #[arg(value_name = "PAYLOAD")]
        payload: PathBuf,

        /// Print only the canonical bytes that the signature covers
        #[arg(long)]
        canonical: bool,
    },
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "sealcodes=info,sealcodes_core=info",
        _ => "sealcodes=debug,sealcodes_core=debug",
    };
    let filter =
        EnvFilter::try_from_env("SEALCODES_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let quiet = cli.quiet;
    match cli.command {
        Commands::Keygen {
            key_id,
            out_dir,
            force,
        } => commands::keygen::execute(key_id, out_dir, force, quiet),
        Commands::Fingerprint { file, zone, json } => {
            commands::fingerprint::execute(file, zone, json).await
        }
        Commands::Seal {
            file,
            zone,
            provider,
            email,
            user_url,
            endpoint,
            token,
            signing_key,
            key_id,
            output,
        } => {
            let signer = match (signing_key, endpoint, token) {
                (Some(pem), _, _) => commands::seal::SignWith::LocalKey { pem, key_id },
                (None, Some(endpoint), Some(token)) => {
                    commands::seal::SignWith::Service { endpoint, token }
                }
                _ => {
                    return Err(utils::UsageError::new(
                        "seal needs --signing-key, or --endpoint and --token",
                    )
                    .into())
                }
            };
            commands::seal::execute(commands::seal::SealArgs {
                file,
                zone,
                provider,
                email,
                user_url,
                signer,
                output,
                quiet,
            })
            .await
        }
        Commands::Verify {
            payload,
            document,
            public_key,
            valid_from,
            valid_until,
            endpoint,
            threshold,
            json,
        } => {
            let against = match (public_key, endpoint) {
                (Some(pem), _) => commands::verify::VerifyAgainst::PublicKey {
                    pem,
                    valid_from,
                    valid_until,
                },
                (None, Some(endpoint)) => commands::verify::VerifyAgainst::Service { endpoint },
                (None, None) => {
                    return Err(
                        utils::UsageError::new("verify needs --public-key or --endpoint").into(),
                    )
                }
            };
            commands::verify::execute(payload, document, against, threshold, json, quiet).await
        }
        Commands::Inspect { payload, canonical } => commands::inspect::execute(payload, canonical),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Err(err) = run(cli).await {
        let exit = ExitCode::from_anyhow(&err);
        if let Some(message) = &exit.message {
            eprintln!("{} {}", "error:".red().bold(), message);
        }
        std::process::exit(exit.code);
    }
}
