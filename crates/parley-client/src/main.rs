// crates/parley-client/src/main.rs

use std::io::{self, BufRead};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use parley_client::{ClientOptions, Ending, Session};

#[derive(Parser)]
#[clap(name = "parley-client")]
#[clap(about = "Join a parley broker and chat")]
struct Cli {
    /// Broker to join
    broker: String,

    /// Name shown to everyone else in the room
    user: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Quiet by default so log lines don't interleave with the chat.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let opts = ClientOptions {
        broker: cli.broker,
        user: cli.user,
        run_dir: std::env::var_os("PARLEY_RUN_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".")),
        advanced: std::env::var_os("PARLEY_ADVANCED").is_some(),
        id: std::process::id(),
    };

    let session = Session::join(&opts).await?;
    let input = spawn_stdin_reader().context("starting input thread")?;
    let interrupt = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    match session.run(input, io::stdout(), interrupt).await? {
        Ending::Rejected => bail!("broker {} is full", opts.broker),
        Ending::Departed | Ending::Shutdown => Ok(()),
    }
}

/// Read stdin on a plain thread; a blocked read must never hold up exit.
fn spawn_stdin_reader() -> io::Result<mpsc::UnboundedReceiver<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("reading stdin: {}", e);
                        break;
                    }
                }
            }
        })?;
    Ok(rx)
}
