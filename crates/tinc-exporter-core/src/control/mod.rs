//! tinc control channel: the local Unix socket tincd exposes for `tinc` CLI.
//!
//! Every query reads the daemon's pidfile for the current cookie, dials a
//! fresh connection, authenticates, sends one request and reads the
//! matching response lines until the request is echoed back on its own.
//!
//! ## Exchange
//!
//! ```text
//! client                                   tincd
//!   │  0 ^<cookie> 0                         │
//!   │  18 3                                  │
//!   │───────────────────────────────────────▶│
//!   │                  0 <name> 17.7         │  greeting, skipped
//!   │                  4 0 <pid>             │  ack, skipped
//!   │                  18 3 <node line>      │  decoded
//!   │                  18 3 <node line>      │  decoded
//!   │                  18 3                  │  end of response
//!   │◀───────────────────────────────────────│
//! ```

pub mod client;
pub mod error;
pub mod locator;
pub mod request;

pub use client::{ControlClient, read_response};
pub use error::ControlError;
pub use locator::{Cookie, DaemonDescriptor, Locator};
pub use request::{CTL_VERSION_CURRENT, ControlRequest, Request, RequestType};
