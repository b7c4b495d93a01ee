//! Scan command implementation.
//!
//! Merges flags over the loaded settings, reads and prepares targets, then
//! runs the orchestrator while the result sink drains its stream.

use crate::cleanup::PostProcessor;
use crate::cli::OutputFormat;
use crate::config::AppSettings;
use crate::error::{CliError, CliResult, ScanError};
use crate::input::TargetSource;
use crate::output::{self, ResultSink};
use crate::resolver::{DnsLookup, HostPreparer};
use crate::scanner::{
    BoxedProber, Orchestrator, RateLimitedProber, RateLimiter, ScanConfig, TcpProber,
};
use crate::types::parse_ports;
use clap::Args;
use std::fs::File;
use std::io::{self, Write};
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::{debug, info};

/// Scan targets for open TCP ports.
///
/// Flags left unset fall back to the settings file, then to built-in defaults.
#[derive(Args, Debug)]
pub struct ScanCommand {
    /// Single target: IP address or hostname
    #[arg(short = 't', long, value_name = "TARGET")]
    pub target: Option<String>,

    /// Single CIDR block, e.g. 192.168.1.0/24
    #[arg(long, value_name = "CIDR")]
    pub cidr: Option<String>,

    /// Read CIDR blocks from a file, or from stdin when no file is given
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    pub cidr_list: Option<Option<PathBuf>>,

    /// Read hosts from a file, one per line
    #[arg(short = 'l', long, value_name = "PATH")]
    pub list: Option<PathBuf>,

    /// Ports to scan (e.g., "80", "80,443", "1-1000", "22,80,443,8000-9000") [default: 80,443]
    #[arg(short, long)]
    pub ports: Option<String>,

    /// Hosts scanned at once [default: 10]
    #[arg(short = 'c', long)]
    pub concurrency: Option<usize>,

    /// Probes in flight per host [default: same as --concurrency]
    #[arg(long, value_name = "N")]
    pub host_concurrency: Option<usize>,

    /// Connect timeout in seconds [default: 2]
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Extra lookups for a hostname that fails to resolve [default: 3]
    #[arg(long)]
    pub retries: Option<u32>,

    /// Seconds between lookups [default: 1]
    #[arg(long, value_name = "SECS")]
    pub delay: Option<u64>,

    /// Hosts with more open ports than this are reduced to the fallback ports [default: 30]
    #[arg(long, value_name = "N")]
    pub truncate_threshold: Option<usize>,

    /// Ports probed on a reduced host [default: 80,443]
    #[arg(long, value_name = "PORTS")]
    pub fallback_ports: Option<String>,

    /// Skip hostnames resolving to this address (repeatable, replaces the defaults)
    #[arg(long = "skip-address", value_name = "IP")]
    pub skip_addresses: Vec<IpAddr>,

    /// Scan hostnames regardless of the address they resolve to
    #[arg(long, conflicts_with = "skip_addresses")]
    pub no_skip: bool,

    /// Maximum probes per second, 0 for unlimited [default: 0]
    #[arg(long, value_name = "PPS")]
    pub rate: Option<u32>,

    /// Hostname lookups running at once [default: 16]
    #[arg(long, value_name = "N")]
    pub resolve_parallelism: Option<usize>,

    /// Append plain results to this file
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Run the cleanup pass, writing the cleaned results to --output
    #[arg(long, requires = "output")]
    pub clean: bool,

    /// Per-host result count above which the cleanup pass reduces a host [default: 20]
    #[arg(long, value_name = "N")]
    pub clean_threshold: Option<usize>,

    /// Format of the result lines on stdout
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Plain)]
    pub format: OutputFormat,
}

impl ScanCommand {
    /// Overlay the flags that were given onto `settings`.
    pub fn apply(&self, settings: &mut AppSettings) {
        if let Some(ports) = &self.ports {
            settings.ports = ports.clone();
        }
        if let Some(concurrency) = self.concurrency {
            settings.concurrency = concurrency;
        }
        if let Some(per_host) = self.host_concurrency {
            settings.per_host_concurrency = Some(per_host);
        }
        if let Some(timeout) = self.timeout {
            settings.timeout_secs = timeout;
        }
        if let Some(retries) = self.retries {
            settings.retries = retries;
        }
        if let Some(delay) = self.delay {
            settings.retry_delay_secs = delay;
        }
        if let Some(threshold) = self.truncate_threshold {
            settings.truncate_threshold = threshold;
        }
        if let Some(fallback) = &self.fallback_ports {
            settings.fallback_ports = fallback.clone();
        }
        if self.no_skip {
            settings.skip_addresses.clear();
        } else if !self.skip_addresses.is_empty() {
            settings.skip_addresses = self.skip_addresses.clone();
        }
        if let Some(rate) = self.rate {
            settings.rate_limit = rate;
        }
        if let Some(parallelism) = self.resolve_parallelism {
            settings.resolve_parallelism = parallelism;
        }
        if let Some(threshold) = self.clean_threshold {
            settings.cleanup_threshold = threshold;
        }
    }

    /// Where targets come from.
    pub fn source(&self) -> TargetSource {
        TargetSource::select(
            self.target.clone(),
            self.cidr.clone(),
            self.cidr_list.clone(),
            self.list.clone(),
        )
    }

    /// Execute the scan command.
    pub async fn execute(
        &self,
        mut settings: AppSettings,
        verbose: bool,
        quiet: bool,
    ) -> CliResult<()> {
        self.apply(&mut settings);

        // Ports are validated before any target is read.
        let ports = parse_ports(&settings.ports)?;
        let policy = settings.truncation_policy()?;

        let cleanup_output = match (self.clean, &self.output) {
            (true, Some(output)) => Some(output.clone()),
            (true, None) => {
                return Err(CliError::Other("--clean requires --output".to_string()));
            }
            (false, _) => None,
        };

        let specs = {
            let stdin = io::stdin();
            self.source().load(stdin.lock())?
        };
        debug!(targets = specs.len(), "targets read");

        let preparer = HostPreparer::new(DnsLookup::new(), settings.resolve_options());
        let hosts = preparer.prepare(specs).await;

        if hosts.is_empty() && !quiet {
            output::print_warning("no hosts to scan");
        }
        if !quiet && self.format == OutputFormat::Plain {
            output::print_scan_header(
                hosts.len(),
                ports.len(),
                settings.concurrency,
                settings.per_host_concurrency(),
            );
        }

        let mut config = ScanConfig::new(ports, settings.concurrency)
            .with_per_host_concurrency(settings.per_host_concurrency())
            .with_truncation(policy);
        if verbose {
            config = config.with_progress();
        }

        let results_file = if cleanup_output.is_some() {
            // Each cleanup run starts from an empty intermediate file.
            File::create(&settings.raw_results_file)?;
            Some(settings.raw_results_file.clone())
        } else {
            self.output.clone()
        };

        let mut sink = ResultSink::new(io::stdout(), self.format);
        if let Some(path) = &results_file {
            sink = sink.with_file(path)?;
        }

        let (handle, results) = Orchestrator::new(build_prober(&settings), config).start(hosts);
        let written = sink.consume(results).await?;
        let summary = handle
            .await
            .map_err(|e| ScanError::TaskFailed(e.to_string()))??;
        io::stdout().flush()?;

        info!(written, "results written");
        if !quiet {
            output::print_summary(&summary);
        }

        if let Some(output_path) = cleanup_output {
            let processor =
                PostProcessor::locate(&settings.cleanup_program, settings.cleanup_threshold);
            debug!(program = %processor.program().display(), "cleanup program located");
            processor
                .run(&settings.raw_results_file, &output_path)
                .await?;
            if !quiet {
                output::print_info(&format!(
                    "Cleaned results written to {}",
                    output_path.display()
                ));
            }
        }

        Ok(())
    }
}

/// Plain TCP connect prober, rate limited when a rate is configured.
fn build_prober(settings: &AppSettings) -> BoxedProber {
    let tcp = TcpProber::new(settings.timeout());
    match RateLimiter::new(settings.rate_limit) {
        Some(limiter) => Box::new(RateLimitedProber::new(tcp, limiter)),
        None => Box::new(tcp),
    }
}
