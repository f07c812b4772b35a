//! Configuration builders for tests.

use std::path::Path;

use tinc_exporter_config::{AppConfig, SocketNaming};

/// Fluent builder for [`AppConfig`] in tests.
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .run_dir(fake.run_dir())
///     .network("vpn")
///     .poll_timeout_ms(500)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn run_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.tinc.run_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn network(mut self, network: &str) -> Self {
        self.config.tinc.network = network.to_string();
        self
    }

    pub fn socket_naming(mut self, naming: SocketNaming) -> Self {
        self.config.tinc.socket_naming = naming;
        self
    }

    pub fn socket_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.tinc.socket_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn listen_addr(mut self, addr: &str) -> Self {
        self.config.exporter.listen_addr = addr.to_string();
        self
    }

    pub fn listen_port(mut self, port: u16) -> Self {
        self.config.exporter.listen_port = port;
        self
    }

    pub fn metrics_path(mut self, path: &str) -> Self {
        self.config.exporter.metrics_path = path.to_string();
        self
    }

    pub fn poll_timeout_ms(mut self, ms: u64) -> Self {
        self.config.exporter.poll_timeout_ms = ms;
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
