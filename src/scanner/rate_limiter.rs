//! Rate limiting for probes.
//!
//! Provides token bucket rate limiting to cap how many connection attempts
//! per second the whole scan issues, independent of the concurrency ceilings.

use crate::error::ScanError;
use crate::scanner::traits::Prober;
use crate::types::Port;
use async_trait::async_trait;
use governor::{Quota, RateLimiter as GovLimiter};
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

type DirectLimiter = GovLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A rate limiter for controlling scan speed.
///
/// Uses a token bucket algorithm to enforce a maximum probes-per-second limit.
pub struct RateLimiter {
    limiter: Arc<DirectLimiter>,
}

impl RateLimiter {
    /// Create a new rate limiter with the specified probes-per-second limit.
    ///
    /// Returns `None` for a rate of 0, which means unlimited.
    pub fn new(rate: u32) -> Option<Self> {
        let rate = NonZeroU32::new(rate)?;
        let limiter = GovLimiter::direct(Quota::per_second(rate));

        Some(Self {
            limiter: Arc::new(limiter),
        })
    }

    /// Wait until a token is available.
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

impl Clone for RateLimiter {
    fn clone(&self) -> Self {
        Self {
            limiter: Arc::clone(&self.limiter),
        }
    }
}

/// Wraps a prober so every attempt first waits on a shared rate limiter.
pub struct RateLimitedProber<P> {
    inner: P,
    limiter: RateLimiter,
}

impl<P: Prober> RateLimitedProber<P> {
    /// Wrap `inner` with `limiter`.
    pub fn new(inner: P, limiter: RateLimiter) -> Self {
        Self { inner, limiter }
    }
}

#[async_trait]
impl<P: Prober> Prober for RateLimitedProber<P> {
    async fn probe(&self, address: IpAddr, port: Port) -> Result<(), ScanError> {
        self.limiter.wait().await;
        self.inner.probe(address, port).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProber(AtomicUsize);

    #[async_trait]
    impl Prober for CountingProber {
        async fn probe(&self, _address: IpAddr, _port: Port) -> Result<(), ScanError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_zero_rate_is_unlimited() {
        assert!(RateLimiter::new(0).is_none());
    }

    #[tokio::test]
    async fn test_rate_limiter_creation() {
        let limiter = RateLimiter::new(100).unwrap();
        assert!(limiter.limiter.check().is_ok());
    }

    #[test]
    fn test_rate_limiter_clone_shares_state() {
        let limiter1 = RateLimiter::new(1).unwrap();
        let limiter2 = limiter1.clone();

        assert!(limiter1.limiter.check().is_ok());
        assert!(limiter2.limiter.check().is_err());
    }

    #[tokio::test]
    async fn test_limited_prober_delegates() {
        let prober = RateLimitedProber::new(
            CountingProber(AtomicUsize::new(0)),
            RateLimiter::new(1000).unwrap(),
        );
        let addr = IpAddr::V4(Ipv4Addr::LOCALHOST);
        for p in 1..=5 {
            prober.probe(addr, Port::new(p).unwrap()).await.unwrap();
        }
        assert_eq!(prober.inner.0.load(Ordering::SeqCst), 5);
    }
}
