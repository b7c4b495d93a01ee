//! Reduce noisy hosts in a `host:port` results file.
//!
//! Usage: `portsweep-clean INPUT THRESHOLD OUTPUT`

use anyhow::{Context, Result};
use clap::Parser;
use portsweep::cleanup::clean_file;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Keep only ports 80 and 443 for hosts listing more than THRESHOLD ports.
#[derive(Parser, Debug)]
#[command(name = "portsweep-clean")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Reduce noisy hosts in a results file", long_about = None)]
struct Args {
    /// Raw results file, one host:port per line
    input: PathBuf,

    /// Per-host line count above which a host is reduced
    threshold: usize,

    /// Where the cleaned results are written (may be INPUT)
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let stats = clean_file(&args.input, args.threshold, &args.output).with_context(|| {
        format!(
            "failed to clean {} into {}",
            args.input.display(),
            args.output.display()
        )
    })?;

    info!(
        hosts = stats.hosts,
        reduced = stats.reduced,
        lines_in = stats.lines_in,
        lines_out = stats.lines_out,
        "cleanup done"
    );
    Ok(())
}
