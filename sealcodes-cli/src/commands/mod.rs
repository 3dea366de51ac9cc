//! Subcommand implementations.

pub mod fingerprint;
pub mod inspect;
pub mod keygen;
pub mod seal;
pub mod verify;
