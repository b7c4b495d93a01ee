//! Per-host scanning.
//!
//! A [`HostScanner`] probes every port of one host under the host's own
//! concurrency pool, watches the open-port count, and collapses hosts that
//! answer on too many ports to a small set of canonical ports.
//!
//! The scan runs through four stages:
//!
//! 1. **Probing**: one task per port, gated by a per-host [`ConcurrencyPool`].
//!    Once the open count passes the truncation threshold a per-host
//!    [`CancellationToken`] fires and no further probes are started. Probes
//!    already connecting are left to finish.
//! 2. **Deciding**: if the threshold was passed, the accumulated ports are
//!    discarded and only the fallback ports are probed, one after another.
//! 3. **Emitting**: one [`ScanResult`] per surviving port goes to the stream.
//! 4. **Done**: the [`HostReport`] is returned to the orchestrator, which
//!    releases the host's global token.

use crate::error::ScanError;
use crate::scanner::pool::ConcurrencyPool;
use crate::scanner::traits::{Prober, ScanResult};
use crate::types::{Host, Port};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Open-port threshold above which a host is truncated.
pub const DEFAULT_TRUNCATE_THRESHOLD: usize = 30;

/// Ports re-probed on a truncated host.
pub const DEFAULT_FALLBACK_PORTS: [u16; 2] = [80, 443];

/// When and how to collapse a host that reports too many open ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncationPolicy {
    /// A host is truncated once its open-port count is strictly greater than this.
    pub threshold: usize,
    /// Ports probed instead of the full list on a truncated host.
    pub fallback_ports: Vec<Port>,
}

impl TruncationPolicy {
    /// Create a policy.
    pub fn new(threshold: usize, fallback_ports: Vec<Port>) -> Self {
        Self {
            threshold,
            fallback_ports,
        }
    }

    /// Whether `open` ports are enough to truncate the host.
    pub fn exceeded(&self, open: usize) -> bool {
        open > self.threshold
    }
}

impl Default for TruncationPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_TRUNCATE_THRESHOLD,
            fallback_ports: DEFAULT_FALLBACK_PORTS
                .iter()
                .filter_map(|&p| Port::new(p))
                .collect(),
        }
    }
}

/// Outcome of scanning one host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostReport {
    /// Name the results were reported under.
    pub display_name: String,
    /// Probe tasks started during the probing stage.
    pub probes_dispatched: usize,
    /// Open ports seen during the probing stage.
    pub open_found: usize,
    /// Whether the truncation heuristic replaced the port list.
    pub truncated: bool,
    /// Results sent to the stream.
    pub emitted: usize,
    /// Highest number of probes that held a per-host token at once.
    pub peak_probes: usize,
}

/// Scans all ports of a single host.
pub struct HostScanner<P> {
    prober: Arc<P>,
    ports: Arc<[Port]>,
    concurrency: usize,
    policy: Arc<TruncationPolicy>,
}

impl<P> HostScanner<P>
where
    P: Prober + 'static,
{
    /// Create a scanner sharing the prober, port list and policy with its siblings.
    pub fn new(
        prober: Arc<P>,
        ports: Arc<[Port]>,
        concurrency: usize,
        policy: Arc<TruncationPolicy>,
    ) -> Self {
        Self {
            prober,
            ports,
            concurrency,
            policy,
        }
    }

    /// Scan `host` and send its results to `results`.
    pub async fn scan(
        &self,
        host: &Host,
        results: &mpsc::UnboundedSender<ScanResult>,
    ) -> Result<HostReport, ScanError> {
        let pool = ConcurrencyPool::new(self.concurrency);
        let (open, dispatched) = self.probe_all(host, &pool).await?;

        let mut report = HostReport {
            display_name: host.display_name.clone(),
            probes_dispatched: dispatched,
            open_found: open.len(),
            peak_probes: pool.peak(),
            ..HostReport::default()
        };

        let surviving = if self.policy.exceeded(open.len()) {
            debug!(
                open = open.len(),
                threshold = self.policy.threshold,
                "open-port threshold exceeded, probing fallback ports only"
            );
            report.truncated = true;
            self.probe_fallback(host).await
        } else {
            open
        };

        for port in surviving {
            if results
                .send(ScanResult::new(host.display_name.clone(), port))
                .is_err()
            {
                debug!("result stream closed, dropping remaining results");
                break;
            }
            report.emitted += 1;
        }

        Ok(report)
    }

    async fn probe_all(
        &self,
        host: &Host,
        pool: &ConcurrencyPool,
    ) -> Result<(Vec<Port>, usize), ScanError> {
        let open = Arc::new(Mutex::new(Vec::new()));
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();
        let mut dispatched = 0;

        for &port in self.ports.iter() {
            if cancel.is_cancelled() {
                break;
            }

            let token = pool.acquire().await?;
            let prober = Arc::clone(&self.prober);
            let open = Arc::clone(&open);
            let cancel = cancel.clone();
            let threshold = self.policy.threshold;
            let address = host.address;

            dispatched += 1;
            tasks.spawn(async move {
                let _token = token;
                if cancel.is_cancelled() {
                    return;
                }

                match prober.probe(address, port).await {
                    Ok(()) => {
                        let mut open = open.lock().await;
                        open.push(port);
                        if open.len() > threshold {
                            cancel.cancel();
                        }
                    }
                    Err(e) => trace!(%port, error = %e, "port not open"),
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "probe task failed");
            }
        }

        let open = std::mem::take(&mut *open.lock().await);
        Ok((open, dispatched))
    }

    async fn probe_fallback(&self, host: &Host) -> Vec<Port> {
        let mut open = Vec::new();
        for &port in &self.policy.fallback_ports {
            if self.prober.probe(host.address, port).await.is_ok() {
                open.push(port);
            }
        }
        open
    }
}
