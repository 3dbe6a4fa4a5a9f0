//! greylined — the greyline daemon.
//!
//! Watches a fixed set of consensus nodes, greylists degrading ones,
//! expands the cluster around them and replaces nodes that fail.
//!
//! # Usage
//!
//! ```text
//! greylined run --config /etc/greyline/greyline.toml
//! greylined validate --config greyline.toml
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use greyline_core::GreylineConfig;

const DEFAULT_FILTER: &str = "info,greylined=debug,greyline=debug";

#[derive(Parser)]
#[command(name = "greylined", about = "greyline cluster health controller", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the control loop until interrupted.
    Run {
        /// Path to greyline.toml.
        #[arg(long, short, default_value = "greyline.toml")]
        config: PathBuf,

        /// Override `agent.interval`, e.g. "5s" or "500ms".
        #[arg(long)]
        interval: Option<String>,

        /// Log output format.
        #[arg(long, value_enum, default_value_t = LogFormat::Text)]
        log_format: LogFormat,
    },
    /// Check a config file and exit.
    Validate {
        /// Path to greyline.toml.
        #[arg(long, short, default_value = "greyline.toml")]
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            interval,
            log_format,
        } => {
            init_tracing(log_format);
            run(config, interval).await
        }
        Command::Validate { config } => validate(config),
    }
}

async fn run(config_path: PathBuf, interval: Option<String>) -> anyhow::Result<()> {
    let config = GreylineConfig::from_file(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let interval = greylined::resolve_interval(&config, interval.as_deref())?;
    let mut control = greylined::build(&config, interval)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        control.run(shutdown_rx).await;
    });

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received, finishing current cycle"),
        Err(e) => warn!(error = %e, "cannot listen for ctrl-c, shutting down"),
    }
    let _ = shutdown_tx.send(true);
    handle.await.context("control loop task panicked")?;

    info!("greyline daemon stopped");
    Ok(())
}

fn validate(config_path: PathBuf) -> anyhow::Result<()> {
    let config = GreylineConfig::from_file(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    println!(
        "{}: ok ({} nodes, {} classifier, interval {:?})",
        config_path.display(),
        config.cluster.nodes.len(),
        config.classifier.mode(),
        config.agent.interval(),
    );
    Ok(())
}
