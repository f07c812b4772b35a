#![deny(unsafe_code)]

//! tinc-exporter CLI: serves metrics, or runs one-off control queries.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tinc_exporter_config::AppConfig;
use tinc_exporter_core::build_info;
use tinc_exporter_core::control::{ControlClient, Locator};
use tinc_exporter_core::{Exporter, NodeRecord, TrafficRecord};

/// Prometheus exporter for a tinc VPN daemon.
#[derive(Parser)]
#[command(name = "tinc-exporter", version = build_info::VERSION, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "tinc-exporter.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Override the tinc runtime directory.
    #[arg(short = 'd', long, global = true)]
    run_dir: Option<PathBuf>,

    /// Override the tinc network name.
    #[arg(short = 'n', long, global = true)]
    network: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve Prometheus metrics over HTTP.
    Serve,

    /// Dump the daemon's node list once.
    Nodes {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Dump per-node traffic counters once.
    Traffic {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Show the daemon pid and port from its pidfile.
    Pid,

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, from_file) = load_config(&cli.config).await?;
    let config = apply_overrides(config, cli.run_dir.clone(), cli.network.clone())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_filter(cli.verbose, &config))),
        )
        .init();
    if !from_file {
        info!(path = %cli.config.display(), "config file not found, using defaults");
    }

    match cli.command {
        Commands::Serve => cmd_serve(config).await?,
        Commands::Nodes { json } => cmd_nodes(&config, json).await?,
        Commands::Traffic { json } => cmd_traffic(&config, json).await?,
        Commands::Pid => cmd_pid(&config).await?,
        Commands::Config { show } => cmd_config(&cli.config, &config, show)?,
    }

    Ok(())
}

async fn cmd_serve(config: AppConfig) -> Result<()> {
    info!(version = %build_info::version_string(), "starting tinc exporter");
    let exporter = Exporter::new(config);
    exporter.run().await?;
    Ok(())
}

async fn cmd_nodes(config: &AppConfig, json: bool) -> Result<()> {
    let nodes = client(config).query_nodes().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&nodes)?);
    } else {
        print!("{}", render_nodes(&nodes));
    }
    Ok(())
}

async fn cmd_traffic(config: &AppConfig, json: bool) -> Result<()> {
    let rows = client(config).query_traffic().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print!("{}", render_traffic(&rows));
    }
    Ok(())
}

async fn cmd_pid(config: &AppConfig) -> Result<()> {
    let descriptor = client(config).query_descriptor().await?;
    println!(
        "pid {} host {} port {}",
        descriptor.pid, descriptor.host, descriptor.port
    );
    Ok(())
}

fn cmd_config(config_path: &Path, config: &AppConfig, show: bool) -> Result<()> {
    if show {
        let toml_str = toml::to_string_pretty(config).context("serializing configuration")?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

fn client(config: &AppConfig) -> ControlClient {
    ControlClient::new(Locator::from_config(&config.tinc))
}

/// Load the config file, falling back to defaults when it does not exist.
/// The flag reports whether the file was found.
async fn load_config(path: &Path) -> Result<(AppConfig, bool)> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        let config = AppConfig::load(path)
            .await
            .with_context(|| format!("loading {}", path.display()))?;
        Ok((config, true))
    } else {
        Ok((AppConfig::default(), false))
    }
}

fn apply_overrides(
    mut config: AppConfig,
    run_dir: Option<PathBuf>,
    network: Option<String>,
) -> Result<AppConfig> {
    if let Some(dir) = run_dir {
        config.tinc.run_dir = dir;
    }
    if let Some(net) = network {
        config.tinc.network = net;
    }
    config.validate()?;
    Ok(config)
}

fn log_filter(verbose: u8, config: &AppConfig) -> String {
    match verbose {
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

fn render_nodes(nodes: &[NodeRecord]) -> String {
    let mut out = format!(
        "{:<20} {:<26} {:<20} {:>6} {:>10}\n",
        "NAME", "REACHABILITY", "VIA", "PMTU", "RTT(ms)"
    );
    for node in nodes {
        out.push_str(&format!(
            "{:<20} {:<26} {:<20} {:>6} {:>10.3}\n",
            node.name,
            node.reachability().to_string(),
            node.via_peer(),
            node.effective_path_mtu(),
            node.round_trip_seconds() * 1000.0,
        ));
    }
    out
}

fn render_traffic(rows: &[TrafficRecord]) -> String {
    let mut out = format!(
        "{:<20} {:>12} {:>14} {:>12} {:>14}\n",
        "NAME", "IN_PACKETS", "IN_BYTES", "OUT_PACKETS", "OUT_BYTES"
    );
    for row in rows {
        out.push_str(&format!(
            "{:<20} {:>12} {:>14} {:>12} {:>14}\n",
            row.name, row.in_packets, row.in_bytes, row.out_packets, row.out_bytes
        ));
    }
    out
}
