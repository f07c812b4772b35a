#![deny(unsafe_code)]

//! tinc-exporter core.
//!
//! Talks to a running tinc daemon over its local control socket, decodes
//! the node and traffic dumps, classifies how each peer is reached, and
//! renders the result as Prometheus metrics on demand.

/// Compile-time build metadata (version, git hash, profile).
pub mod build_info;
/// Poll orchestration and metrics sinks.
pub mod collector;
/// Control socket client, request kinds, and runtime file lookup.
pub mod control;
/// Exporter process lifecycle.
pub mod exporter;
/// Node records and reachability derivation.
pub mod node;
/// Positional line scanner shared by the decoders.
pub mod scan;
/// HTTP routes for scrapes and health.
pub mod server;
/// Traffic counter records.
pub mod traffic;

pub use collector::{Collector, MetricsSink, PollReport, PrometheusSink};
pub use control::{ControlClient, ControlError, DaemonDescriptor, Locator};
pub use exporter::Exporter;
pub use node::{NodeRecord, NodeStatus, Reachability};
pub use traffic::TrafficRecord;
