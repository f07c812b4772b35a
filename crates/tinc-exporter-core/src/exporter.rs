//! Exporter process: startup, shutdown, and the serving loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{info, warn};

use tinc_exporter_config::AppConfig;

use crate::collector::Collector;
use crate::control::{ControlClient, Locator};
use crate::server::{self, ExporterState};

/// Shutdown signal sent via broadcast channel.
#[derive(Debug, Clone)]
pub struct ShutdownSignal;

/// The tinc metrics exporter.
pub struct Exporter {
    config: AppConfig,
    shutdown_tx: broadcast::Sender<ShutdownSignal>,
}

impl Exporter {
    /// Create a new exporter instance with the given configuration.
    pub fn new(config: AppConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            shutdown_tx,
        }
    }

    /// Build the collector described by the configuration.
    pub fn collector(&self) -> Collector {
        let client = ControlClient::new(Locator::from_config(&self.config.tinc));
        Collector::new(
            client,
            Duration::from_millis(self.config.exporter.poll_timeout_ms),
        )
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<(), ExporterError> {
        let addr = self.config.listen_socket();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ExporterError::Bind {
                addr: addr.clone(),
                source,
            })?;
        self.run_on(listener).await
    }

    /// Serve on an already-bound listener until shutdown.
    pub async fn run_on(&self, listener: TcpListener) -> Result<(), ExporterError> {
        info!(
            network = %self.config.tinc.network,
            run_dir = %self.config.tinc.run_dir.display(),
            path = %self.config.exporter.metrics_path,
            "tinc exporter starting"
        );

        let state = Arc::new(ExporterState {
            collector: self.collector(),
        });
        let app = server::router(state, &self.config.exporter.metrics_path);
        let serving = server::serve(listener, app, self.shutdown_tx.subscribe());
        tokio::pin!(serving);

        tokio::select! {
            result = &mut serving => result?,
            _ = tokio::signal::ctrl_c() => {
                warn!("Ctrl-C received, initiating graceful shutdown");
                let _ = self.shutdown_tx.send(ShutdownSignal);
                serving.await?;
            }
        }

        info!("exporter stopped");
        Ok(())
    }

    /// Request a graceful shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(ShutdownSignal);
    }

    /// Get a reference to the exporter's configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

/// Errors from the exporter runtime.
#[derive(Debug, thiserror::Error)]
pub enum ExporterError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exporter_creation() {
        let exporter = Exporter::new(AppConfig::default());
        assert_eq!(exporter.config().exporter.listen_port, 9101);
        assert_eq!(exporter.collector().network(), "");
    }

    #[tokio::test]
    async fn test_exporter_shutdown() {
        let exporter = Arc::new(Exporter::new(AppConfig::default()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let runner = Arc::clone(&exporter);
        let handle = tokio::spawn(async move { runner.run_on(listener).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        exporter.shutdown();

        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("exporter did not stop")
            .unwrap();
        assert!(result.is_ok());
    }
}
