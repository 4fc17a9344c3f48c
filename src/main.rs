use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::info;

use pixelboard::{server, CanvasStore, FileLog};

/// Shared collaborative pixel canvas over HTTP.
#[derive(Parser, Debug)]
#[command(name = "pixelboard", version, about)]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: String,

    /// Path to the append-only pixel log
    #[arg(long, default_value = "pixels.log")]
    log_file: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    // An unreadable log is fatal: the grid cannot be trusted without a full
    // replay, so refuse to serve rather than start from a blank canvas.
    let log = FileLog::open(&cli.log_file)
        .with_context(|| format!("failed to open pixel log {}", cli.log_file.display()))?;
    let store =
        CanvasStore::open(Box::new(log)).context("failed to rebuild canvas from log")?;
    info!("canvas ready, log at {}", cli.log_file.display());

    server::run(&cli.listen, Arc::new(store))?;
    Ok(())
}
