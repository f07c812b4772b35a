//! Poll orchestration and metrics sinks.
//!
//! A scrape calls [`Collector::poll`], which queries the daemon, and then
//! folds the resulting [`PollReport`] into a [`MetricsSink`]. Sinks are
//! plain objects owned by the caller; nothing is registered globally.

use std::future::Future;
use std::time::Duration;

use metrics::{describe_gauge, gauge, with_local_recorder};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusRecorder};
use tracing::{debug, warn};

use crate::control::{ControlClient, ControlError, DaemonDescriptor};
use crate::node::NodeRecord;

/// Destination for the values of one poll.
pub trait MetricsSink {
    fn set_receive_packets(&mut self, node: &str, value: f64);
    fn set_receive_bytes(&mut self, node: &str, value: f64);
    fn set_transmit_packets(&mut self, node: &str, value: f64);
    fn set_transmit_bytes(&mut self, node: &str, value: f64);
    fn set_udp_ping_rtt(&mut self, node: &str, seconds: f64);
    fn set_path_mtu(&mut self, node: &str, value: f64);
    fn set_reachability(&mut self, node: &str, via: &str, value: f64);
    fn set_pid(&mut self, node: &str, port: &str, value: f64);
    fn set_up(&mut self, value: f64);
}

/// What one poll managed to learn. A `None` field means that query failed.
#[derive(Debug, Default)]
pub struct PollReport {
    pub descriptor: Option<DaemonDescriptor>,
    pub nodes: Option<Vec<NodeRecord>>,
}

impl PollReport {
    /// The daemon's own node, when the node dump succeeded.
    pub fn myself(&self) -> Option<&NodeRecord> {
        self.nodes.as_ref()?.iter().find(|n| n.is_myself())
    }

    /// Write every value in this report to `sink`.
    pub fn record(&self, sink: &mut dyn MetricsSink) {
        sink.set_up(if self.nodes.is_some() { 1.0 } else { 0.0 });

        if let Some(descriptor) = &self.descriptor {
            let name = self.myself().map(|n| n.name.as_str()).unwrap_or_default();
            sink.set_pid(name, &descriptor.port, f64::from(descriptor.pid));
        }

        for node in self.nodes.iter().flatten() {
            sink.set_receive_packets(&node.name, node.in_packets as f64);
            sink.set_receive_bytes(&node.name, node.in_bytes as f64);
            sink.set_transmit_packets(&node.name, node.out_packets as f64);
            sink.set_transmit_bytes(&node.name, node.out_bytes as f64);
            sink.set_udp_ping_rtt(&node.name, node.round_trip_seconds());
            sink.set_path_mtu(&node.name, f64::from(node.effective_path_mtu()));
            sink.set_reachability(
                &node.name,
                node.via_peer(),
                f64::from(node.reachability().value()),
            );
        }
    }
}

/// Polls one tinc network on demand.
#[derive(Debug, Clone)]
pub struct Collector {
    client: ControlClient,
    timeout: Duration,
}

impl Collector {
    pub fn new(client: ControlClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn network(&self) -> &str {
        self.client.locator().network()
    }

    /// Query the pidfile and the node list concurrently, each under the
    /// configured deadline. Failures are logged and leave a `None`.
    pub async fn poll(&self) -> PollReport {
        let (descriptor, nodes) = tokio::join!(
            self.bounded("descriptor", self.client.query_descriptor()),
            self.bounded("nodes", self.client.query_nodes()),
        );
        debug!(
            network = self.network(),
            descriptor = descriptor.is_some(),
            nodes = ?nodes.as_ref().map(Vec::len),
            "poll complete"
        );
        PollReport { descriptor, nodes }
    }

    async fn bounded<T>(
        &self,
        query: &'static str,
        fut: impl Future<Output = Result<T, ControlError>>,
    ) -> Option<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(network = self.network(), query, error = %e, "tinc query failed");
                None
            }
            Err(_) => {
                warn!(
                    network = self.network(),
                    query,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "tinc query timed out"
                );
                None
            }
        }
    }
}

const RECEIVE_PACKETS: &str = "tinc_network_receive_packets_total";
const RECEIVE_BYTES: &str = "tinc_network_receive_bytes_total";
const TRANSMIT_PACKETS: &str = "tinc_network_transmit_packets_total";
const TRANSMIT_BYTES: &str = "tinc_network_transmit_bytes_total";
const UDP_PING_RTT: &str = "tinc_network_udp_ping_rtt";
const PATH_MTU: &str = "tinc_network_pmtu";
const REACHABILITY: &str = "tinc_network_reachability";
const PID: &str = "tinc_runtime_pid";
const UP: &str = "tinc_runtime_up";

/// Prometheus text-format sink backed by a private recorder.
///
/// Build one per scrape so series for vanished nodes disappear.
pub struct PrometheusSink {
    network: String,
    recorder: PrometheusRecorder,
}

impl PrometheusSink {
    pub fn new(network: impl Into<String>) -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        with_local_recorder(&recorder, || {
            describe_gauge!(RECEIVE_PACKETS, "Tinc network statistic receive_packets");
            describe_gauge!(RECEIVE_BYTES, "Tinc network statistic receive_bytes");
            describe_gauge!(TRANSMIT_PACKETS, "Tinc network statistic transmit_packets");
            describe_gauge!(TRANSMIT_BYTES, "Tinc network statistic transmit_bytes");
            describe_gauge!(UDP_PING_RTT, "Tinc network udp ping rtt in seconds");
            describe_gauge!(PATH_MTU, "Tinc network path MTU of the direct UDP link");
            describe_gauge!(REACHABILITY, "Tinc network reachability with other node");
            describe_gauge!(PID, "Tinc daemon pid");
            describe_gauge!(UP, "Whether the tinc daemon answered the last node dump");
        });
        Self {
            network: network.into(),
            recorder,
        }
    }

    fn node_gauge(&self, metric: &'static str, node: &str, value: f64) {
        let labels = [
            ("network", self.network.clone()),
            ("name", node.to_string()),
        ];
        with_local_recorder(&self.recorder, || gauge!(metric, &labels).set(value));
    }

    /// Render the Prometheus text exposition.
    pub fn render(&self) -> String {
        self.recorder.handle().render()
    }
}

impl MetricsSink for PrometheusSink {
    fn set_receive_packets(&mut self, node: &str, value: f64) {
        self.node_gauge(RECEIVE_PACKETS, node, value);
    }

    fn set_receive_bytes(&mut self, node: &str, value: f64) {
        self.node_gauge(RECEIVE_BYTES, node, value);
    }

    fn set_transmit_packets(&mut self, node: &str, value: f64) {
        self.node_gauge(TRANSMIT_PACKETS, node, value);
    }

    fn set_transmit_bytes(&mut self, node: &str, value: f64) {
        self.node_gauge(TRANSMIT_BYTES, node, value);
    }

    fn set_udp_ping_rtt(&mut self, node: &str, seconds: f64) {
        self.node_gauge(UDP_PING_RTT, node, seconds);
    }

    fn set_path_mtu(&mut self, node: &str, value: f64) {
        self.node_gauge(PATH_MTU, node, value);
    }

    fn set_reachability(&mut self, node: &str, via: &str, value: f64) {
        let labels = [
            ("network", self.network.clone()),
            ("name", node.to_string()),
            ("via", via.to_string()),
        ];
        with_local_recorder(&self.recorder, || gauge!(REACHABILITY, &labels).set(value));
    }

    fn set_pid(&mut self, node: &str, port: &str, value: f64) {
        let labels = [
            ("network", self.network.clone()),
            ("name", node.to_string()),
            ("port", port.to_string()),
        ];
        with_local_recorder(&self.recorder, || gauge!(PID, &labels).set(value));
    }

    fn set_up(&mut self, value: f64) {
        let network = self.network.clone();
        with_local_recorder(&self.recorder, || gauge!(UP, "network" => network).set(value));
    }
}
