//! Result cleanup post-pass.
//!
//! Groups `host:port` lines by host and, for hosts listing more ports than a
//! threshold, keeps only a small set of ports. The pass runs as a separate
//! program (`portsweep-clean INPUT THRESHOLD OUTPUT`); [`PostProcessor`] is the
//! engine side that invokes it.

use crate::error::{CliError, CliResult};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// Default per-host line count above which a host is reduced.
pub const DEFAULT_CLEAN_THRESHOLD: usize = 20;

/// Ports kept for a reduced host.
pub const DEFAULT_KEEP_PORTS: [&str; 2] = ["80", "443"];

/// Counts from a cleanup run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanStats {
    /// Distinct hosts seen.
    pub hosts: usize,
    /// Hosts reduced to the keep list.
    pub reduced: usize,
    /// Lines read.
    pub lines_in: usize,
    /// Lines written.
    pub lines_out: usize,
}

/// Split a `host:port` line on its last colon.
fn split_line(line: &str) -> Option<(&str, &str)> {
    let (host, port) = line.trim().rsplit_once(':')?;
    if host.is_empty() || port.is_empty() {
        return None;
    }
    Some((host, port))
}

/// Clean result lines.
///
/// Host order follows first appearance and each host keeps its line order.
/// Hosts with more than `threshold` entries keep only the `keep` ports that
/// they listed, in `keep` order. Malformed lines are dropped.
pub fn clean_lines<'a, I>(lines: I, threshold: usize, keep: &[&str]) -> (Vec<String>, CleanStats)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut order: Vec<&str> = Vec::new();
    let mut by_host: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut stats = CleanStats::default();

    for line in lines {
        let Some((host, port)) = split_line(line) else {
            continue;
        };
        stats.lines_in += 1;
        by_host
            .entry(host)
            .or_insert_with(|| {
                order.push(host);
                Vec::new()
            })
            .push(port);
    }

    let mut out = Vec::new();
    for host in order {
        let ports = &by_host[host];
        if ports.len() > threshold {
            stats.reduced += 1;
            for keep_port in keep {
                if ports.contains(keep_port) {
                    out.push(format!("{}:{}", host, keep_port));
                }
            }
        } else {
            out.extend(ports.iter().map(|port| format!("{}:{}", host, port)));
        }
    }

    stats.hosts = by_host.len();
    stats.lines_out = out.len();
    (out, stats)
}

/// Clean the file at `input` and write the result to `output`.
///
/// `output` may be the same path as `input`.
pub fn clean_file(input: &Path, threshold: usize, output: &Path) -> io::Result<CleanStats> {
    let content = fs::read_to_string(input)?;
    let (lines, stats) = clean_lines(content.lines(), threshold, &DEFAULT_KEEP_PORTS);

    let mut body = lines.join("\n");
    if !body.is_empty() {
        body.push('\n');
    }
    fs::write(output, body)?;
    Ok(stats)
}

/// Runs the external cleanup program over a raw results file.
#[derive(Debug, Clone)]
pub struct PostProcessor {
    program: PathBuf,
    threshold: usize,
}

impl PostProcessor {
    /// Use `program` with the given threshold.
    pub fn new(program: impl Into<PathBuf>, threshold: usize) -> Self {
        Self {
            program: program.into(),
            threshold,
        }
    }

    /// Use `program`, preferring a copy installed next to the running
    /// executable when `program` is a bare name.
    pub fn locate(program: &Path, threshold: usize) -> Self {
        let sibling = (program.components().count() == 1)
            .then(|| std::env::current_exe().ok())
            .flatten()
            .and_then(|exe| exe.parent().map(|dir| dir.join(program)))
            .filter(|candidate| candidate.is_file());

        Self::new(sibling.unwrap_or_else(|| program.to_path_buf()), threshold)
    }

    /// The program that will be run.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Invoke `program INPUT THRESHOLD OUTPUT` and wait for it.
    pub async fn run(&self, input: &Path, output: &Path) -> CliResult<()> {
        debug!(
            program = %self.program.display(),
            input = %input.display(),
            output = %output.display(),
            threshold = self.threshold,
            "running cleanup"
        );

        let status = Command::new(&self.program)
            .arg(input)
            .arg(self.threshold.to_string())
            .arg(output)
            .status()
            .await
            .map_err(|e| {
                CliError::Cleanup(format!("cannot run {}: {}", self.program.display(), e))
            })?;

        if !status.success() {
            return Err(CliError::Cleanup(format!(
                "{} exited with {}",
                self.program.display(),
                status
            )));
        }

        info!(output = %output.display(), "cleanup finished");
        Ok(())
    }
}
