//! Core type definitions using newtype patterns for type safety.
//!
//! These types prevent common logic errors by making invalid states unrepresentable
//! at compile time.

mod port;
mod target;

pub use port::{parse_ports, Port, PortError, PortRange, PortSpec};
pub use target::{expand_cidr, increment_ip, CidrHosts, Host, TargetError, TargetSpec};
