//! TCP connect prober.
//!
//! Performs a plain TCP handshake using the operating system's socket API
//! and closes the connection immediately. No payload is exchanged.

use crate::error::ScanError;
use crate::scanner::traits::Prober;
use crate::types::Port;
use async_trait::async_trait;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// TCP connect prober with a per-attempt timeout.
///
/// Does not require elevated privileges.
#[derive(Debug, Clone)]
pub struct TcpProber {
    timeout: Duration,
}

impl TcpProber {
    /// Create a new TCP prober.
    ///
    /// # Arguments
    /// * `timeout` - Upper bound on each connection attempt
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

fn classify(addr: SocketAddr, e: io::Error) -> ScanError {
    if e.kind() == io::ErrorKind::ConnectionRefused {
        return ScanError::ConnectionRefused;
    }

    let error_str = e.to_string().to_lowercase();
    if error_str.contains("unreachable") {
        if error_str.contains("host") {
            ScanError::HostUnreachable
        } else {
            ScanError::NetworkUnreachable(e.to_string())
        }
    } else {
        ScanError::ConnectionFailed {
            target: addr.ip().to_string(),
            port: addr.port(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, address: IpAddr, port: Port) -> Result<(), ScanError> {
        let addr = SocketAddr::new(address, port.as_u16());

        match timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                Ok(())
            }
            Ok(Err(e)) => Err(classify(addr, e)),
            Err(_) => Err(ScanError::Timeout),
        }
    }
}
