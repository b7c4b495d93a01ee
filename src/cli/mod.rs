//! Command-line interface definitions.
//!
//! `portsweep` is a single command: target selection, scan tuning and output
//! flags live on [`ScanCommand`], which is flattened into [`Cli`] next to the
//! global verbosity and configuration flags.

mod scan;

pub use scan::ScanCommand;

use crate::config::AppSettings;
use crate::error::CliResult;
use clap::Parser;
use std::path::PathBuf;

/// portsweep - a concurrent TCP port sweeper.
///
/// Probes a port list on every target with bounded host and port
/// concurrency, printing one `host:port` line per open port as it is found.
/// Hosts answering on too many ports are reduced to a small fallback set.
#[derive(Parser, Debug)]
#[command(name = "portsweep")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A concurrent TCP port sweeper", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub scan: ScanCommand,

    /// Enable verbose output and a progress bar
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress everything except results and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to a settings file
    #[arg(long, env = "PORTSWEEP_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Load settings and run the scan.
    pub async fn run(&self) -> CliResult<()> {
        let settings = AppSettings::load(self.config.as_deref())?;
        self.scan.execute(settings, self.verbose, self.quiet).await
    }

    /// Default log directive for the chosen verbosity.
    pub fn log_directive(&self) -> &'static str {
        if self.verbose {
            "portsweep=debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        }
    }
}

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Bare `host:port` lines
    #[default]
    Plain,
    /// One JSON object per line
    Json,
    /// `host,port` rows
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["portsweep"]).unwrap();
        assert!(!cli.verbose);
        assert!(!cli.quiet);
        assert_eq!(cli.scan.format, OutputFormat::Plain);
        assert!(cli.scan.target.is_none());
        assert!(cli.scan.cidr_list.is_none());
        assert_eq!(cli.log_directive(), "warn");
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["portsweep", "-v", "-q"]).is_err());
        let cli = Cli::try_parse_from(["portsweep", "-q"]).unwrap();
        assert_eq!(cli.log_directive(), "error");
    }

    #[test]
    fn test_format_flag() {
        let cli = Cli::try_parse_from(["portsweep", "-f", "json"]).unwrap();
        assert_eq!(cli.scan.format, OutputFormat::Json);
        assert_eq!(OutputFormat::Csv.to_string(), "csv");
    }
}
