// crates/parley-client/src/bin/parley-showlog.rs

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use parley_client::showlog;
use parley_ipc::LogReader;

#[derive(Parser)]
#[clap(name = "parley-showlog")]
#[clap(about = "Print a broker's roster snapshot and every logged message")]
struct Cli {
    /// Activity log written by a parley-server in advanced mode
    log: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let reader = LogReader::open(&cli.log)?;
    let lines = showlog::dump(&reader)
        .with_context(|| format!("{} does not look like a parley log", cli.log.display()))?;

    for line in lines {
        println!("{}", line);
    }
    Ok(())
}
