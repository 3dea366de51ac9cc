#![no_main]

//! Fuzz target for CompactAttestationData::from_payload()
//!
//! Payloads come from scanned QR codes, so any byte string must decode or
//! fail with an error.
//!
//! Run with: cargo +nightly fuzz run fuzz_from_payload

use libfuzzer_sys::fuzz_target;
use sealcodes_core::CompactAttestationData;

fuzz_target!(|data: &[u8]| {
    if let Ok(payload) = std::str::from_utf8(data) {
        if let Ok(compact) = CompactAttestationData::from_payload(payload) {
            // Anything that decodes must re-encode
            let _ = compact.to_payload().expect("decoded payload must re-encode");
        }
    }
});
