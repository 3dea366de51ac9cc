use thiserror::Error;

#[derive(Error, Debug)]
pub enum SealError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Exclusion zone out of bounds: {0}")]
    GeometryOutOfBounds(String),

    #[error("Invalid fill color: {0}")]
    InvalidColor(String),

    #[error("Identity mismatch: {0}")]
    IdentityMismatch(String),

    #[error("Server configuration error: {0}")]
    ServerConfiguration(String),

    #[error("Signature envelope does not match server addendum: {0}")]
    EnvelopeMismatch(String),

    #[error("Unsupported compact attestation version {version} (current: {current})")]
    UnsupportedCompactVersion { version: u8, current: u8 },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Key error: {0}")]
    KeyError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Key registry error: {0}")]
    RegistryError(String),

    #[error("Sealing session not found")]
    SessionNotFound,

    #[error("Invalid sealing transition: {event} is not allowed in state {from}")]
    InvalidTransition {
        from: &'static str,
        event: &'static str,
    },

    #[error("Remote service returned {status}: {message}")]
    RemoteError { status: u16, message: String },

    #[cfg(feature = "network")]
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl From<serde_json::Error> for SealError {
    fn from(err: serde_json::Error) -> Self {
        SealError::SerializationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SealError>;
