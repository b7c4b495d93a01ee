//! Scanner module - fans host scans out under a global concurrency ceiling.
//!
//! The [`Orchestrator`] acquires one global token per host before starting
//! its [`HostScanner`], so at most `global_concurrency` hosts are under scan
//! at any instant. Each host scanner in turn bounds its own port probes.
//! Results are streamed through an unbounded channel that closes only once
//! every host scanner has finished.

pub mod host;
pub mod pool;
pub mod rate_limiter;
pub mod tcp;
pub mod traits;

use crate::error::ScanError;
use crate::types::{Host, Port};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{info, info_span, trace, warn, Instrument};

pub use host::{HostReport, HostScanner, TruncationPolicy};
pub use pool::{ConcurrencyPool, PoolToken};
pub use rate_limiter::{RateLimitedProber, RateLimiter};
pub use tcp::TcpProber;
pub use traits::{BoxedProber, Prober, ScanResult};

/// Configuration for a scan run.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Ports probed on every host, in order.
    pub ports: Arc<[Port]>,
    /// Maximum number of hosts under scan at once.
    pub global_concurrency: usize,
    /// Maximum number of probes in flight for one host.
    pub per_host_concurrency: usize,
    /// Collapse rule for hosts with too many open ports.
    pub truncation: TruncationPolicy,
    /// Show a progress bar on stderr.
    pub progress: bool,
}

impl ScanConfig {
    /// Create a configuration with the same ceiling for hosts and ports.
    pub fn new(ports: Vec<Port>, concurrency: usize) -> Self {
        Self {
            ports: ports.into(),
            global_concurrency: concurrency,
            per_host_concurrency: concurrency,
            truncation: TruncationPolicy::default(),
            progress: false,
        }
    }

    /// Set the per-host ceiling.
    pub fn with_per_host_concurrency(mut self, concurrency: usize) -> Self {
        self.per_host_concurrency = concurrency;
        self
    }

    /// Set the truncation policy.
    pub fn with_truncation(mut self, policy: TruncationPolicy) -> Self {
        self.truncation = policy;
        self
    }

    /// Enable the progress bar.
    pub fn with_progress(mut self) -> Self {
        self.progress = true;
        self
    }
}

/// Totals for a completed scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Hosts whose scanner ran to completion.
    pub hosts_scanned: usize,
    /// Hosts collapsed by the truncation heuristic.
    pub hosts_truncated: usize,
    /// Hosts whose scan task failed.
    pub hosts_failed: usize,
    /// Probe tasks started across all hosts.
    pub probes_dispatched: usize,
    /// Results sent to the stream.
    pub results_emitted: usize,
    /// Highest number of hosts under scan at once.
    pub peak_active_hosts: usize,
    /// Highest number of concurrent probes seen on any single host.
    pub peak_probes_per_host: usize,
    /// Highest number of spawned host tasks not yet collected.
    pub peak_pending_hosts: usize,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl ScanSummary {
    fn record(&mut self, report: &HostReport) {
        self.hosts_scanned += 1;
        self.probes_dispatched += report.probes_dispatched;
        self.results_emitted += report.emitted;
        self.peak_probes_per_host = self.peak_probes_per_host.max(report.peak_probes);
        if report.truncated {
            self.hosts_truncated += 1;
        }
    }

    fn absorb(&mut self, joined: Result<Result<HostReport, ScanError>, JoinError>) {
        match joined {
            Ok(Ok(report)) => self.record(&report),
            Ok(Err(e)) => {
                warn!(error = %e, "host scan failed");
                self.hosts_failed += 1;
            }
            Err(e) => {
                warn!(error = %e, "host task panicked or was cancelled");
                self.hosts_failed += 1;
            }
        }
    }
}

/// Drives host scanners across all hosts.
pub struct Orchestrator<P> {
    prober: Arc<P>,
    config: ScanConfig,
}

impl<P> Orchestrator<P>
where
    P: Prober + 'static,
{
    /// Create an orchestrator around a prober.
    pub fn new(prober: P, config: ScanConfig) -> Self {
        Self::with_shared(Arc::new(prober), config)
    }

    /// Create an orchestrator around an already shared prober.
    pub fn with_shared(prober: Arc<P>, config: ScanConfig) -> Self {
        Self { prober, config }
    }

    /// Start the scan in the background.
    ///
    /// Returns the task handle and the receiving end of the result stream. The
    /// stream ends after the last host scanner finishes.
    pub fn start(
        self,
        hosts: Vec<Host>,
    ) -> (
        JoinHandle<Result<ScanSummary, ScanError>>,
        mpsc::UnboundedReceiver<ScanResult>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move { self.run(hosts, tx).await });
        (handle, rx)
    }

    /// Scan every host, sending results to `results`.
    ///
    /// Consumes the sender: the stream closes once this call and every host
    /// task it spawned have dropped their handles.
    pub async fn run(
        &self,
        hosts: Vec<Host>,
        results: mpsc::UnboundedSender<ScanResult>,
    ) -> Result<ScanSummary, ScanError> {
        let start_time = Instant::now();
        let global = ConcurrencyPool::new(self.config.global_concurrency);
        let policy = Arc::new(self.config.truncation.clone());
        let progress = self.progress_bar(hosts.len());

        info!(
            hosts = hosts.len(),
            ports = self.config.ports.len(),
            global_concurrency = global.capacity(),
            per_host_concurrency = self.config.per_host_concurrency,
            "starting scan"
        );

        let mut summary = ScanSummary::default();
        let mut tasks = JoinSet::new();
        for host in hosts {
            let token = global.acquire().await?;
            // Finished hosts are collected as we go so the set stays bounded by
            // the global ceiling rather than the host count.
            while let Some(joined) = tasks.try_join_next() {
                summary.absorb(joined);
            }
            trace!(active = global.in_use(), pending = tasks.len(), "dispatching host");
            let scanner = HostScanner::new(
                Arc::clone(&self.prober),
                Arc::clone(&self.config.ports),
                self.config.per_host_concurrency,
                Arc::clone(&policy),
            );
            let results = results.clone();
            let progress = progress.clone();
            let span = info_span!("host", host = %host.display_name, address = %host.address);

            tasks.spawn(
                async move {
                    let report = scanner.scan(&host, &results).await;
                    drop(token);
                    progress.inc(1);
                    report
                }
                .instrument(span),
            );
            summary.peak_pending_hosts = summary.peak_pending_hosts.max(tasks.len());
        }
        drop(results);

        while let Some(joined) = tasks.join_next().await {
            summary.absorb(joined);
        }

        progress.finish_and_clear();
        summary.peak_active_hosts = global.peak();
        summary.duration_ms = start_time.elapsed().as_millis() as u64;

        info!(
            hosts = summary.hosts_scanned,
            truncated = summary.hosts_truncated,
            results = summary.results_emitted,
            duration_ms = summary.duration_ms,
            "scan complete"
        );

        Ok(summary)
    }

    fn progress_bar(&self, hosts: usize) -> ProgressBar {
        if !self.config.progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(hosts as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} hosts ({percent}%)")
        {
            pb.set_style(style.progress_chars("=>-"));
        }
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }
}

#[cfg(test)]
mod tests {
    use super::host::tests::{ports, SimProber};
    use super::*;
    use std::collections::HashSet;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::atomic::Ordering;
    use tokio::net::TcpListener;

    fn hosts(n: u8) -> Vec<Host> {
        (1..=n)
            .map(|i| Host::from_ip(IpAddr::V4(Ipv4Addr::new(10, 0, 0, i))))
            .collect()
    }

    fn config(ports: Arc<[Port]>, global: usize, per_host: usize) -> ScanConfig {
        ScanConfig {
            ports,
            global_concurrency: global,
            per_host_concurrency: per_host,
            truncation: TruncationPolicy::default(),
            progress: false,
        }
    }

    async fn collect(mut rx: mpsc::UnboundedReceiver<ScanResult>) -> Vec<ScanResult> {
        let mut out = Vec::new();
        while let Some(result) = rx.recv().await {
            out.push(result);
        }
        out
    }

    #[tokio::test]
    async fn test_every_host_reports() {
        let prober = SimProber::new([22, 80], Duration::ZERO);
        let orchestrator = Orchestrator::new(prober, config(ports(1..=100), 4, 8));

        let (handle, rx) = orchestrator.start(hosts(10));
        let results = collect(rx).await;
        let summary = handle.await.unwrap().unwrap();

        assert_eq!(results.len(), 20);
        assert_eq!(summary.hosts_scanned, 10);
        assert_eq!(summary.results_emitted, 20);
        assert_eq!(summary.probes_dispatched, 1000);

        let names: HashSet<&str> = results.iter().map(|r| r.display_name.as_str()).collect();
        assert_eq!(names.len(), 10);
    }

    #[tokio::test]
    async fn test_global_ceiling_holds() {
        let prober = Arc::new(SimProber::new([5], Duration::from_millis(3)));
        let orchestrator =
            Orchestrator::with_shared(Arc::clone(&prober), config(ports(1..=10), 3, 2));

        let (handle, rx) = orchestrator.start(hosts(12));
        let results = collect(rx).await;
        let summary = handle.await.unwrap().unwrap();

        assert_eq!(results.len(), 12);
        assert!(summary.peak_active_hosts <= 3);
        assert!(summary.peak_probes_per_host <= 2);
        // Hosts times per-host ceiling bounds every probe in flight.
        assert!(prober.peak.load(Ordering::SeqCst) <= 6);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_ceilings_hold_on_multi_thread_runtime() {
        let prober = Arc::new(SimProber::new(Vec::<u16>::new(), Duration::from_millis(2)));
        let orchestrator =
            Orchestrator::with_shared(Arc::clone(&prober), config(ports(1..=20), 2, 3));

        let (handle, rx) = orchestrator.start(hosts(8));
        assert!(collect(rx).await.is_empty());
        let summary = handle.await.unwrap().unwrap();

        assert_eq!(summary.hosts_scanned, 8);
        assert!(summary.peak_active_hosts <= 2);
        assert!(summary.peak_probes_per_host <= 3);
        assert!(prober.peak.load(Ordering::SeqCst) <= 6);
    }

    #[tokio::test]
    async fn test_stream_closes_after_all_hosts() {
        let prober = SimProber::new([443], Duration::from_millis(10));
        let orchestrator = Orchestrator::new(prober, config(ports([80, 443]), 2, 2));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let run = orchestrator.run(hosts(5), tx);
        let consume = async {
            let mut count = 0;
            while rx.recv().await.is_some() {
                count += 1;
            }
            count
        };

        let (summary, count) = tokio::join!(run, consume);
        let summary = summary.unwrap();
        assert_eq!(count, 5);
        assert_eq!(summary.hosts_scanned, 5);
    }

    /// Answers like [`SimProber`] but stalls on one address.
    struct SlowHostProber {
        slow: IpAddr,
    }

    #[async_trait::async_trait]
    impl Prober for SlowHostProber {
        async fn probe(&self, address: IpAddr, port: Port) -> Result<(), ScanError> {
            let delay = if address == self.slow { 60 } else { 2 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if port.as_u16() == 443 {
                Ok(())
            } else {
                Err(ScanError::ConnectionRefused)
            }
        }
    }

    #[tokio::test]
    async fn test_stream_stays_open_for_slowest_host() {
        let slow = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let orchestrator =
            Orchestrator::new(SlowHostProber { slow }, config(ports([80, 443]), 5, 2));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let run = orchestrator.run(hosts(5), tx);
        let consume = async {
            let mut seen = Vec::new();
            while let Some(result) = rx.recv().await {
                seen.push(result.display_name);
            }
            seen
        };

        let (summary, seen) = tokio::join!(run, consume);
        assert_eq!(summary.unwrap().hosts_scanned, 5);
        assert_eq!(seen.len(), 5);
        // The stalled host started first but its result is the last one out.
        assert_eq!(seen.last().map(String::as_str), Some("10.0.0.1"));
    }

    #[tokio::test]
    async fn test_finished_hosts_are_collected_during_dispatch() {
        let hosts: Vec<Host> = (1..=500u32)
            .map(|i| Host::from_ip(IpAddr::V4(Ipv4Addr::from(0x0a00_0000 + i))))
            .collect();
        let orchestrator = Orchestrator::new(
            SimProber::new([22], Duration::ZERO),
            config(ports([22, 80]), 3, 2),
        );

        let (handle, rx) = orchestrator.start(hosts);
        let results = collect(rx).await;
        let summary = handle.await.unwrap().unwrap();

        assert_eq!(results.len(), 500);
        assert_eq!(summary.hosts_scanned, 500);
        assert!(summary.peak_active_hosts <= 3);
        assert!(
            summary.peak_pending_hosts <= 6,
            "pending host tasks grew to {}",
            summary.peak_pending_hosts
        );
    }

    #[tokio::test]
    async fn test_truncated_hosts_are_counted() {
        let prober = SimProber::new(1..=100, Duration::ZERO);
        let orchestrator = Orchestrator::new(prober, config(ports(1..=200), 2, 4));

        let (handle, rx) = orchestrator.start(hosts(3));
        let results = collect(rx).await;
        let summary = handle.await.unwrap().unwrap();

        assert_eq!(summary.hosts_truncated, 3);
        assert!(results.iter().all(|r| r.port.as_u16() == 80));
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_host_list() {
        let orchestrator = Orchestrator::new(
            SimProber::new([80], Duration::ZERO),
            config(ports([80]), 4, 4),
        );
        let (handle, rx) = orchestrator.start(Vec::new());
        assert!(collect(rx).await.is_empty());
        assert_eq!(handle.await.unwrap().unwrap().hosts_scanned, 0);
    }

    #[tokio::test]
    async fn test_real_tcp_scan_of_localhost() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open = listener.local_addr().unwrap().port();
        let closed = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().port()
        };

        let config = ScanConfig::new(
            vec![Port::new(open).unwrap(), Port::new(closed).unwrap()],
            2,
        );
        let orchestrator = Orchestrator::new(TcpProber::new(Duration::from_secs(1)), config);
        let host = Host::new(IpAddr::V4(Ipv4Addr::LOCALHOST), "localhost");

        let (handle, rx) = orchestrator.start(vec![host]);
        let results = collect(rx).await;
        handle.await.unwrap().unwrap();

        assert_eq!(results, vec![ScanResult::new("localhost", Port::new(open).unwrap())]);
    }
}
