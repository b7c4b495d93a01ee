//! Error types for portsweep.
//!
//! Uses `thiserror` for ergonomic error definitions.

use crate::types::PortError;
use std::path::PathBuf;
use thiserror::Error;

/// Error type for a single probe or for the scan engine itself.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("connection to {target}:{port} failed: {reason}")]
    ConnectionFailed {
        target: String,
        port: u16,
        reason: String,
    },

    #[error("Connection timed out")]
    Timeout,

    #[error("Connection refused")]
    ConnectionRefused,

    #[error("Network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("Host unreachable")]
    HostUnreachable,

    #[error("concurrency pool closed")]
    PoolClosed,

    #[error("scan task failed: {0}")]
    TaskFailed(String),
}

/// Errors from loading settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine the configuration directory")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("invalid settings file: {0}")]
    InvalidFormat(String),

    #[error("invalid setting: {0}")]
    InvalidValue(String),
}

/// Top-level error for the command-line driver.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("invalid port specification: {0}")]
    Port(#[from] PortError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cleanup failed: {0}")]
    Cleanup(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl CliError {
    /// Process exit code for this error.
    ///
    /// Usage problems (bad ports, bad settings) exit with 2, everything else with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Port(_) | Self::Config(_) => 2,
            _ => 1,
        }
    }
}

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type alias for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let err: CliError = PortError::Empty.into();
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.to_string(), "invalid port specification: empty port specification");

        let err = CliError::Cleanup("exit status 1".to_string());
        assert_eq!(err.exit_code(), 1);
    }
}
