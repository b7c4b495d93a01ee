//! Prober trait abstraction.
//!
//! Defines the single network primitive the engine depends on, so the
//! host scanner and orchestrator can be driven by simulated probers in tests.

use crate::error::ScanError;
use crate::types::Port;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

/// A port that accepted a TCP connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanResult {
    /// Name of the host as the user specified it.
    #[serde(rename = "host")]
    pub display_name: String,
    /// The open port.
    pub port: Port,
}

impl ScanResult {
    /// Create a new result.
    pub fn new(display_name: impl Into<String>, port: Port) -> Self {
        Self {
            display_name: display_name.into(),
            port,
        }
    }
}

impl fmt::Display for ScanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.display_name, self.port)
    }
}

/// A single bounded connection attempt against one `(address, port)` pair.
///
/// `Ok(())` means the port accepted a connection. Any error means the port is
/// not reported; implementations never retry.
///
/// # Example
///
/// ```ignore
/// use portsweep::scanner::{Prober, TcpProber};
///
/// let prober = TcpProber::new(Duration::from_secs(2));
/// let open = prober.probe("127.0.0.1".parse()?, Port::new(22).unwrap()).await.is_ok();
/// ```
#[async_trait]
pub trait Prober: Send + Sync {
    /// Attempt one connection.
    async fn probe(&self, address: IpAddr, port: Port) -> Result<(), ScanError>;
}

#[async_trait]
impl<P: Prober + ?Sized> Prober for Arc<P> {
    async fn probe(&self, address: IpAddr, port: Port) -> Result<(), ScanError> {
        (**self).probe(address, port).await
    }
}

/// A boxed prober for dynamic dispatch.
pub type BoxedProber = Box<dyn Prober>;

#[async_trait]
impl Prober for BoxedProber {
    async fn probe(&self, address: IpAddr, port: Port) -> Result<(), ScanError> {
        (**self).probe(address, port).await
    }
}
