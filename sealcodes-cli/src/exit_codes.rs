//! Exit codes following sysexits.h conventions.
//!
//! These codes provide semantic meaning for different failure modes,
//! enabling scripts and CI systems to handle errors appropriately.

use sealcodes_core::SealError;

use crate::utils::UsageError;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Attestation rejected or document no longer matches.
/// Maps to EX_DATAERR from sysexits.h.
pub const VERIFICATION_FAILED: i32 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Signing or verification service unavailable.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const NETWORK_ERROR: i32 = 69;

/// I/O error (cannot write output file).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        let code = if err.downcast_ref::<UsageError>().is_some() {
            USAGE_ERROR
        } else if let Some(seal) = err.chain().find_map(|e| e.downcast_ref::<SealError>()) {
            classify_seal_error(seal)
        } else if message.contains("Failed to read") {
            INPUT_ERROR
        } else if message.contains("verification failed") || message.contains("does not match") {
            VERIFICATION_FAILED
        } else if message.contains("Failed to write") {
            IO_ERROR
        } else {
            GENERAL_ERROR
        };

        Self {
            code,
            message: Some(message),
        }
    }
}

fn classify_seal_error(err: &SealError) -> i32 {
    match err {
        SealError::HttpError(_) | SealError::RemoteError { .. } => NETWORK_ERROR,
        SealError::UnsupportedFormat(_)
        | SealError::GeometryOutOfBounds(_)
        | SealError::InvalidColor(_)
        | SealError::KeyError(_) => USAGE_ERROR,
        SealError::UnsupportedCompactVersion { .. } | SealError::SerializationError(_) => {
            VERIFICATION_FAILED
        }
        _ => GENERAL_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_usage_error() {
        let err = anyhow::Error::new(UsageError::new("verify needs --public-key"));
        assert_eq!(ExitCode::from_anyhow(&err).code, USAGE_ERROR);
    }

    #[test]
    fn test_missing_input() {
        let err = std::fs::read("/nonexistent/doc.png")
            .context("Failed to read file: /nonexistent/doc.png")
            .unwrap_err();
        assert_eq!(ExitCode::from_anyhow(&err).code, INPUT_ERROR);
    }

    #[test]
    fn test_remote_error_is_network() {
        let err = anyhow::Error::new(SealError::RemoteError {
            status: 503,
            message: "down".into(),
        })
        .context("Failed to sign attestation");
        assert_eq!(ExitCode::from_anyhow(&err).code, NETWORK_ERROR);
    }

    #[test]
    fn test_verification_failure() {
        let err = anyhow::anyhow!("Attestation verification failed: SignatureMismatch");
        let exit = ExitCode::from_anyhow(&err);
        assert_eq!(exit.code, VERIFICATION_FAILED);
        assert!(exit.message.unwrap().contains("SignatureMismatch"));
    }
}
