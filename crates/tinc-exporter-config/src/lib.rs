#![deny(unsafe_code)]

//! Configuration loading and validation for tinc-exporter.
//!
//! Loads TOML configuration files and validates them. Provides the
//! [`AppConfig`] type as the central configuration structure, shared by the
//! exporter server and the CLI.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where to find the tinc daemon's pidfile and control socket.
    #[serde(default)]
    pub tinc: TincConfig,

    /// HTTP exporter configuration.
    #[serde(default)]
    pub exporter: ExporterConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How the control socket is named when no explicit path is configured.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SocketNaming {
    /// `tinc.socket` / `tinc.<net>.socket`, as created by tinc 1.1 daemons.
    #[default]
    Suffixed,
    /// `tinc.pid` for the default network, `tinc.<net>.socket` otherwise.
    Legacy,
}

/// Location of the tinc daemon's runtime files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TincConfig {
    /// Runtime directory containing the pidfile and control socket.
    #[serde(default = "default_run_dir")]
    pub run_dir: PathBuf,

    /// Network name (`tincd -n`). Empty selects the default network.
    #[serde(default)]
    pub network: String,

    /// Control socket naming convention.
    #[serde(default)]
    pub socket_naming: SocketNaming,

    /// Explicit control socket path, overriding `socket_naming`.
    #[serde(default)]
    pub socket_path: Option<PathBuf>,
}

impl Default for TincConfig {
    fn default() -> Self {
        Self {
            run_dir: default_run_dir(),
            network: String::new(),
            socket_naming: SocketNaming::default(),
            socket_path: None,
        }
    }
}

fn default_run_dir() -> PathBuf {
    PathBuf::from("/var/run")
}

/// HTTP exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Address the metrics endpoint binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Port the metrics endpoint binds to.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Path serving the Prometheus text exposition.
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,

    /// Deadline applied to each control-channel query during a scrape.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            listen_port: default_listen_port(),
            metrics_path: default_metrics_path(),
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    9101
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_poll_timeout_ms() -> u64 {
    3000
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "loading configuration");
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tinc.run_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "tinc.run_dir must not be empty".to_string(),
            ));
        }
        // Same character set tincd accepts for netnames.
        if !self
            .tinc
            .network
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::Validation(format!(
                "tinc.network may only contain letters, digits and '_', got {:?}",
                self.tinc.network
            )));
        }

        if self.exporter.listen_port == 0 {
            return Err(ConfigError::Validation(
                "exporter.listen_port must be non-zero".to_string(),
            ));
        }
        if self.exporter.listen_addr.is_empty() {
            return Err(ConfigError::Validation(
                "exporter.listen_addr must not be empty".to_string(),
            ));
        }
        if !self.exporter.metrics_path.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "exporter.metrics_path must start with '/', got {:?}",
                self.exporter.metrics_path
            )));
        }
        if self.exporter.metrics_path == "/health" {
            return Err(ConfigError::Validation(
                "exporter.metrics_path must not shadow /health".to_string(),
            ));
        }
        if self.exporter.poll_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "exporter.poll_timeout_ms must be non-zero".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }

        Ok(())
    }

    /// Socket address string for the exporter listener.
    pub fn listen_socket(&self) -> String {
        format!("{}:{}", self.exporter.listen_addr, self.exporter.listen_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.tinc.run_dir, PathBuf::from("/var/run"));
        assert_eq!(config.tinc.network, "");
        assert_eq!(config.tinc.socket_naming, SocketNaming::Suffixed);
        assert_eq!(config.exporter.listen_port, 9101);
        assert_eq!(config.exporter.metrics_path, "/metrics");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.exporter.listen_port, 9101);
        assert_eq!(config.exporter.poll_timeout_ms, 3000);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            [tinc]
            run_dir = "/run"
            network = "office_vpn"
            socket_naming = "legacy"
            socket_path = "/run/custom.socket"

            [exporter]
            listen_addr = "127.0.0.1"
            listen_port = 9200
            metrics_path = "/tinc"
            poll_timeout_ms = 500

            [logging]
            level = "debug"
        "#;
        let config = AppConfig::parse(toml).unwrap();
        assert_eq!(config.tinc.run_dir, PathBuf::from("/run"));
        assert_eq!(config.tinc.network, "office_vpn");
        assert_eq!(config.tinc.socket_naming, SocketNaming::Legacy);
        assert_eq!(
            config.tinc.socket_path.as_deref(),
            Some(Path::new("/run/custom.socket"))
        );
        assert_eq!(config.exporter.listen_addr, "127.0.0.1");
        assert_eq!(config.exporter.listen_port, 9200);
        assert_eq!(config.exporter.metrics_path, "/tinc");
        assert_eq!(config.exporter.poll_timeout_ms, 500);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.listen_socket(), "127.0.0.1:9200");
    }

    #[test]
    fn test_validation_rejects_zero_port() {
        let toml = r#"
            [exporter]
            listen_port = 0
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_empty_addr() {
        let toml = r#"
            [exporter]
            listen_addr = ""
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_relative_metrics_path() {
        let toml = r#"
            [exporter]
            metrics_path = "metrics"
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_health_shadowing() {
        let toml = r#"
            [exporter]
            metrics_path = "/health"
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        let toml = r#"
            [exporter]
            poll_timeout_ms = 0
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_network_name() {
        let toml = r#"
            [tinc]
            network = "../etc"
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_empty_run_dir() {
        let toml = r#"
            [tinc]
            run_dir = ""
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_unknown_socket_naming() {
        let toml = r#"
            [tinc]
            socket_naming = "guess"
        "#;
        assert!(matches!(
            AppConfig::parse(toml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_validation_rejects_bad_log_level() {
        let toml = r#"
            [logging]
            level = "loud"
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    // ── Async file-based loading ──────────────────────────────────────

    #[tokio::test]
    async fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tinc-exporter.toml");
        tokio::fs::write(&path, b"[tinc]\nnetwork = \"vpn\"\n[exporter]\nlisten_port = 4242\n")
            .await
            .unwrap();

        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config.tinc.network, "vpn");
        assert_eq!(config.exporter.listen_port, 4242);
    }

    #[tokio::test]
    async fn test_load_nonexistent_file() {
        let result = AppConfig::load(Path::new("/nonexistent/file.toml")).await;
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[tokio::test]
    async fn test_load_invalid_toml_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        tokio::fs::write(&path, b"not valid toml [[[").await.unwrap();

        let result = AppConfig::load(&path).await;
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    // ── Error display ─────────────────────────────────────────────────

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Validation("bad value".to_string());
        assert_eq!(err.to_string(), "validation error: bad value");
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let config = AppConfig::default();
        let rendered = toml::to_string_pretty(&config).unwrap();
        assert!(rendered.contains("socket_naming = \"suffixed\""));
        let reparsed = AppConfig::parse(&rendered).unwrap();
        assert_eq!(reparsed.exporter.listen_port, config.exporter.listen_port);
    }
}
