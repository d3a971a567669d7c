//! Chat broker binary.

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use parley_server::{Config, Server};

#[derive(Parser)]
#[clap(name = "parley-server")]
#[clap(about = "Chat broker relaying messages between clients over named pipes")]
struct Cli {
    /// Broker name; clients join through `<name>.fifo` in the run directory
    broker: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env().context("reading configuration")?;
    info!(
        "starting parley-server {} in {} (max_clients = {})",
        cli.broker,
        config.run_dir.display(),
        config.max_clients
    );

    let server = Server::start(&cli.broker, config)
        .with_context(|| format!("starting broker {}", cli.broker))?;

    server
        .run(shutdown_signal())
        .await
        .with_context(|| format!("broker {} failed", cli.broker))
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("SIGTERM handler unavailable: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}
