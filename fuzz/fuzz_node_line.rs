//! Fuzz target for the `dump nodes` and `dump traffic` line decoders.
//!
//! Run with: cargo +nightly fuzz run fuzz_node_line
//!
//! Any line must either decode or return an error; a decoded node must
//! classify without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tinc_exporter_core::scan::{LineDecoder, LineOutcome};
use tinc_exporter_core::{NodeRecord, TrafficRecord};

fuzz_target!(|data: &[u8]| {
    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(LineOutcome::Record(node)) = NodeRecord::decode_line(line) {
        let _ = node.reachability();
        let _ = node.via_peer();
        let _ = node.round_trip_seconds();
    }
    let _ = TrafficRecord::decode_line(line);
});
