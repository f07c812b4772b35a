#![deny(unsafe_code)]

//! Shared test utilities for the tinc-exporter workspace.
//!
//! Provides a scripted stand-in for a tinc daemon, config builders, and
//! tracing helpers so that individual crate tests stay concise.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! tinc-exporter-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod fake_tincd;
pub mod tracing_setup;

pub use fake_tincd::{FakeTincd, FakeTincdBuilder};
