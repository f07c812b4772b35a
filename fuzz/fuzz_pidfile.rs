//! Fuzz target for the pidfile parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_pidfile

#![no_main]

use libfuzzer_sys::fuzz_target;
use tinc_exporter_core::DaemonDescriptor;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = DaemonDescriptor::parse(s);
    }
});
