//! Hostname resolution and host preparation.
//!
//! Turns parsed [`TargetSpec`]s into the flat list of [`Host`]s the scanner
//! consumes: literal addresses pass through, CIDR blocks are enumerated and
//! hostnames are looked up with bounded retries.

use crate::types::{expand_cidr, Host, TargetError, TargetSpec};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tracing::{debug, trace};
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// A pluggable name lookup.
#[async_trait]
pub trait HostLookup: Send + Sync {
    /// Look up every address for `name`.
    async fn lookup(&self, name: &str) -> Result<Vec<IpAddr>, TargetError>;
}

/// DNS lookup backed by trust-dns.
pub struct DnsLookup {
    resolver: TokioAsyncResolver,
}

impl DnsLookup {
    /// Build a resolver from the system configuration, falling back to the
    /// library defaults when it cannot be read.
    pub fn new() -> Self {
        let resolver = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|e| {
            debug!(error = %e, "system resolver configuration unavailable, using defaults");
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
        });
        Self { resolver }
    }
}

impl Default for DnsLookup {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostLookup for DnsLookup {
    async fn lookup(&self, name: &str) -> Result<Vec<IpAddr>, TargetError> {
        let response = self
            .resolver
            .lookup_ip(name)
            .await
            .map_err(|e| TargetError::LookupFailed(name.to_string(), e.to_string()))?;
        Ok(response.iter().collect())
    }
}

/// Resolve `name` to its first address.
///
/// Makes up to `retries + 1` attempts, sleeping `delay` between them. An
/// empty answer counts as a failed attempt.
pub async fn resolve_hostname<L>(
    lookup: &L,
    name: &str,
    retries: u32,
    delay: Duration,
) -> Result<IpAddr, TargetError>
where
    L: HostLookup + ?Sized,
{
    let attempts = retries.saturating_add(1);
    for attempt in 1..=attempts {
        match lookup.lookup(name).await {
            Ok(addrs) => {
                if let Some(&first) = addrs.first() {
                    return Ok(first);
                }
                trace!(host = name, attempt, "lookup returned no addresses");
            }
            Err(e) => trace!(host = name, attempt, error = %e, "lookup failed"),
        }

        if attempt < attempts && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    Err(TargetError::ResolutionFailed(name.to_string(), attempts))
}

/// The loopback addresses sinkholed DNS entries commonly point at:
/// `127.0.0.1` through `127.0.0.3`.
pub fn default_skip_addresses() -> Vec<IpAddr> {
    (1..=3)
        .map(|last| IpAddr::V4(Ipv4Addr::new(127, 0, 0, last)))
        .collect()
}

/// Addresses that disqualify a resolved hostname.
///
/// Applied only to hostnames: literal IPs and CIDR members are always kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressFilter {
    blocked: Vec<IpAddr>,
}

impl AddressFilter {
    /// Filter the given addresses.
    pub fn new(blocked: Vec<IpAddr>) -> Self {
        Self { blocked }
    }

    /// A filter that lets everything through.
    pub fn none() -> Self {
        Self::default()
    }

    /// Filter [`default_skip_addresses`].
    pub fn loopback_sinkholes() -> Self {
        Self::new(default_skip_addresses())
    }

    /// Whether `address` is blocked.
    pub fn blocks(&self, address: &IpAddr) -> bool {
        self.blocked.contains(address)
    }
}

/// Options for turning target specs into hosts.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Extra lookup attempts after the first.
    pub retries: u32,
    /// Pause between lookup attempts.
    pub delay: Duration,
    /// Hostnames resolving to these addresses are skipped.
    pub filter: AddressFilter,
    /// Largest CIDR block that will be enumerated.
    pub max_cidr_hosts: u128,
    /// Lookups running at once.
    pub parallelism: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            retries: 3,
            delay: Duration::from_secs(1),
            filter: AddressFilter::loopback_sinkholes(),
            max_cidr_hosts: 1 << 24,
            parallelism: 16,
        }
    }
}

/// Expands and resolves targets into hosts.
pub struct HostPreparer<L> {
    lookup: L,
    options: ResolveOptions,
}

impl<L: HostLookup> HostPreparer<L> {
    /// Create a preparer using `lookup` for hostnames.
    pub fn new(lookup: L, options: ResolveOptions) -> Self {
        Self { lookup, options }
    }

    /// Turn every target into hosts, keeping input order.
    ///
    /// Targets that fail to expand or resolve are skipped.
    pub async fn prepare(&self, targets: Vec<TargetSpec>) -> Vec<Host> {
        let parallelism = self.options.parallelism.max(1);
        let batches: Vec<Vec<Host>> = stream::iter(targets)
            .map(|target| async move {
                match self.prepare_one(&target).await {
                    Ok(hosts) => hosts,
                    Err(e) => {
                        debug!(%target, error = %e, "skipping target");
                        Vec::new()
                    }
                }
            })
            .buffered(parallelism)
            .collect()
            .await;

        batches.into_iter().flatten().collect()
    }

    /// Turn one target into hosts.
    pub async fn prepare_one(&self, target: &TargetSpec) -> Result<Vec<Host>, TargetError> {
        match target {
            TargetSpec::Single(ip) => Ok(vec![Host::from_ip(*ip)]),

            TargetSpec::Cidr(network) => Ok(expand_cidr(*network, self.options.max_cidr_hosts)?
                .map(Host::from_ip)
                .collect()),

            TargetSpec::Hostname(name) => {
                let address = resolve_hostname(
                    &self.lookup,
                    name,
                    self.options.retries,
                    self.options.delay,
                )
                .await?;

                if self.options.filter.blocks(&address) {
                    debug!(host = %name, %address, "skipping host resolved to a filtered address");
                    return Ok(Vec::new());
                }
                Ok(vec![Host::new(address, name.clone())])
            }
        }
    }
}
