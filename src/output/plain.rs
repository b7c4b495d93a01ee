//! Plain text output formatting.
//!
//! Result lines are bare `host:port` so they can be piped. Everything meant
//! for a human goes to stderr with colors.

use crate::scanner::{ScanResult, ScanSummary};
use console::style;

/// Format a result as `host:port`.
pub fn plain_line(result: &ScanResult) -> String {
    result.to_string()
}

/// Print a scan header before scanning begins.
pub fn print_scan_header(hosts: usize, ports: usize, global: usize, per_host: usize) {
    eprintln!(
        "{} {} v{}",
        style("Starting").cyan(),
        style("portsweep").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    eprintln!(
        "{} Hosts: {}  Ports per host: {}",
        style("•").dim(),
        style(hosts).white().bold(),
        style(ports).white().bold()
    );
    eprintln!(
        "{} Concurrency: {} hosts, {} probes per host",
        style("•").dim(),
        style(global).yellow(),
        style(per_host).yellow()
    );
}

/// Print the totals of a finished scan.
pub fn print_summary(summary: &ScanSummary) {
    eprintln!(
        "{} {} open port(s) on {} host(s) in {:.2}s",
        style("Done:").green().bold(),
        style(summary.results_emitted).green().bold(),
        summary.hosts_scanned,
        summary.duration_ms as f64 / 1000.0
    );
    if summary.hosts_truncated > 0 {
        eprintln!(
            "{} {} host(s) answered on too many ports and were reduced to their fallback ports",
            style("•").dim(),
            style(summary.hosts_truncated).yellow()
        );
    }
    if summary.hosts_failed > 0 {
        print_warning(&format!("{} host scan(s) failed", summary.hosts_failed));
    }
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

/// Print an info message.
pub fn print_info(msg: &str) {
    eprintln!("{} {}", style("ℹ").blue().bold(), msg);
}
