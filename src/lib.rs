//! # portsweep - a concurrent TCP port sweeper
//!
//! portsweep probes a list of TCP ports on many hosts at once and streams a
//! `host:port` line for every port that accepts a connection.
//!
//! ## Features
//!
//! - **Flexible Targeting**: Single IPs, hostnames, CIDR blocks, and lists
//!   read from files or stdin
//! - **Two-level Concurrency**: A global ceiling on hosts under scan and a
//!   per-host ceiling on probes in flight
//! - **Noise Suppression**: Hosts answering on too many ports are reduced to
//!   a small fallback set
//! - **Streaming Output**: Plain, JSON, and CSV lines as results arrive
//! - **Cleanup Pass**: An external program that trims noisy hosts from a
//!   results file
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use portsweep::scanner::{Orchestrator, ScanConfig, TcpProber};
//! use portsweep::types::{parse_ports, Host};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let ports = parse_ports("22,80-82").unwrap();
//!     let hosts = vec![Host::from_ip("192.168.1.1".parse().unwrap())];
//!     let config = ScanConfig::new(ports, 10);
//!
//!     let orchestrator = Orchestrator::new(TcpProber::new(Duration::from_secs(2)), config);
//!     let (handle, mut results) = orchestrator.start(hosts);
//!     while let Some(result) = results.recv().await {
//!         println!("{}", result);
//!     }
//!     handle.await.unwrap().unwrap();
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Ports, port specifications, hosts and target specs
//! - [`input`] - Target sources (flags, files, stdin)
//! - [`resolver`] - Hostname lookup with retries and CIDR enumeration
//! - [`scanner`] - Probers, concurrency pools, host scanner and orchestrator
//! - [`output`] - Result sink and formatting
//! - [`cleanup`] - The results cleanup pass
//! - [`config`] - Settings file handling
//! - [`error`] - Error types

pub mod cleanup;
pub mod cli;
pub mod config;
pub mod error;
pub mod input;
pub mod output;
pub mod resolver;
pub mod scanner;
pub mod types;

// Re-export commonly used types
pub use error::{CliError, ScanError};
pub use scanner::{Orchestrator, Prober, ScanConfig, ScanResult, ScanSummary};
pub use types::{Host, Port, PortSpec, TargetSpec};
