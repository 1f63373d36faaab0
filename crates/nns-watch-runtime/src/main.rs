//! # NNS Watch
//!
//! Polls the NNS governance proposal feed and notifies Telegram subscribers
//! about new proposals, honouring each subscriber's muted topics.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use nns_watch_runtime::{Adapters, CliOverrides, RuntimeConfig, WatchRuntime};
use nns_watch_telemetry::{init_telemetry, TelemetryConfig};

/// NNS proposal notifier for Telegram
#[derive(Parser, Debug)]
#[command(name = "nns-watch", version)]
#[command(about = "Notifies Telegram chats about new NNS governance proposals")]
struct Args {
    /// JSON settings file
    #[arg(short, long, default_value = "settings.json")]
    config: PathBuf,

    /// Snapshot file (overrides settings and NNS_WATCH_STATE_PATH)
    #[arg(long)]
    state: Option<PathBuf>,

    /// Serve /metrics and /health on this port
    #[arg(long)]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _telemetry = init_telemetry(&TelemetryConfig::from_env())?;

    let overrides = CliOverrides {
        state_path: args.state,
        metrics_port: args.metrics_port,
    };
    let config = RuntimeConfig::load(&args.config, &overrides)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;

    let adapters = Adapters::from_config(&config)?;
    let mut runtime = WatchRuntime::new(config, adapters);
    runtime.start().await?;

    info!("NNS Watch is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;

    Ok(())
}
