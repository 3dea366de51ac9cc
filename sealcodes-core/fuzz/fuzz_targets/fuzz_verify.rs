#![no_main]

//! Fuzz target for the verification path
//!
//! Decodes arbitrary payloads, expands and canonicalizes them, and checks the
//! signature against a fixed key. None of these steps may panic.
//!
//! Run with: cargo +nightly fuzz run fuzz_verify

use chrono::{TimeZone, Utc};
use libfuzzer_sys::fuzz_target;
use sealcodes_core::verify::check_signature;
use sealcodes_core::{CanonicalBytes, CompactAttestationData, SigningKeyRecord};

// RFC 8032 test vector 1 public key
const PUBLIC_KEY: &str = "11qYAYKxCrfVS/7TyWQHOg7hcvPapiMlrwIaaPcHURo=";

fuzz_target!(|data: &[u8]| {
    let Ok(payload) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(compact) = CompactAttestationData::from_payload(payload) else {
        return;
    };
    let Ok(package) = compact.expand() else {
        return;
    };
    let Ok(canonical) = CanonicalBytes::new(&package) else {
        return;
    };

    let created = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    let record = SigningKeyRecord::ed25519("fuzz", PUBLIC_KEY, created);
    let _ = check_signature(&record, &canonical, compact.signature().unwrap_or(""));
});
