//! Application settings and paths.
//!
//! Settings live in a JSON file in the XDG config directory
//! (`~/.config/portsweep/settings.json` on Linux). A missing file means
//! defaults; command-line flags override whatever is loaded.

use crate::cleanup::DEFAULT_CLEAN_THRESHOLD;
use crate::error::{ConfigError, ConfigResult};
use crate::resolver::{default_skip_addresses, AddressFilter, ResolveOptions};
use crate::scanner::host::{DEFAULT_FALLBACK_PORTS, DEFAULT_TRUNCATE_THRESHOLD};
use crate::scanner::TruncationPolicy;
use crate::types::parse_ports;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application directory paths following the XDG Base Directory Specification.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/portsweep)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Locate the application directories.
    pub fn new() -> ConfigResult<Self> {
        let project = ProjectDirs::from("com", "portsweep", "portsweep")
            .ok_or(ConfigError::DirectoryNotFound)?;

        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
        })
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}

/// Application-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Port specification scanned on every host.
    pub ports: String,
    /// Hosts under scan at once.
    pub concurrency: usize,
    /// Probes in flight per host; `None` reuses `concurrency`.
    pub per_host_concurrency: Option<usize>,
    /// Connect timeout in seconds.
    pub timeout_secs: u64,
    /// Extra hostname lookups after the first failure.
    pub retries: u32,
    /// Seconds between hostname lookups.
    pub retry_delay_secs: u64,
    /// Hostnames resolving to these addresses are not scanned.
    pub skip_addresses: Vec<IpAddr>,
    /// Hosts with more open ports than this are truncated.
    pub truncate_threshold: usize,
    /// Port specification probed on truncated hosts.
    pub fallback_ports: String,
    /// Maximum probes per second, 0 for unlimited.
    pub rate_limit: u32,
    /// Hostname lookups running at once.
    pub resolve_parallelism: usize,
    /// Largest CIDR block that will be expanded.
    pub max_cidr_hosts: u64,
    /// Program run for the cleanup pass.
    pub cleanup_program: PathBuf,
    /// Per-host line count above which the cleanup pass reduces a host.
    pub cleanup_threshold: usize,
    /// Intermediate file raw results go to before cleanup.
    pub raw_results_file: PathBuf,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            ports: "80,443".to_string(),
            concurrency: 10,
            per_host_concurrency: None,
            timeout_secs: 2,
            retries: 3,
            retry_delay_secs: 1,
            skip_addresses: default_skip_addresses(),
            truncate_threshold: DEFAULT_TRUNCATE_THRESHOLD,
            fallback_ports: DEFAULT_FALLBACK_PORTS
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(","),
            rate_limit: 0,
            resolve_parallelism: 16,
            max_cidr_hosts: 1 << 24,
            cleanup_program: PathBuf::from("portsweep-clean"),
            cleanup_threshold: DEFAULT_CLEAN_THRESHOLD,
            raw_results_file: PathBuf::from("portsweep-raw.txt"),
        }
    }
}

impl AppSettings {
    /// Load settings from `path`, or from the default location when `None`.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        if let Some(path) = path {
            return Self::load_from(path);
        }

        let file = Paths::new()?.settings_file();
        if !file.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&file)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))
    }

    /// Connect timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Per-host ceiling, falling back to the global one.
    pub fn per_host_concurrency(&self) -> usize {
        self.per_host_concurrency.unwrap_or(self.concurrency)
    }

    /// Build the truncation policy.
    pub fn truncation_policy(&self) -> ConfigResult<TruncationPolicy> {
        let fallback = parse_ports(&self.fallback_ports).map_err(|e| {
            ConfigError::InvalidValue(format!("fallback ports '{}': {}", self.fallback_ports, e))
        })?;
        Ok(TruncationPolicy::new(self.truncate_threshold, fallback))
    }

    /// Build the host resolution options.
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            retries: self.retries,
            delay: Duration::from_secs(self.retry_delay_secs),
            filter: AddressFilter::new(self.skip_addresses.clone()),
            max_cidr_hosts: u128::from(self.max_cidr_hosts),
            parallelism: self.resolve_parallelism,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = AppSettings::default();
        assert_eq!(settings.ports, "80,443");
        assert_eq!(settings.concurrency, 10);
        assert_eq!(settings.per_host_concurrency(), 10);
        assert_eq!(settings.timeout(), Duration::from_secs(2));
        assert_eq!(settings.retries, 3);
        assert_eq!(settings.fallback_ports, "80,443");
        assert_eq!(settings.skip_addresses.len(), 3);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"concurrency": 50, "per_host_concurrency": 200, "skip_addresses": []}"#,
        )
        .unwrap();

        let settings = AppSettings::load(Some(&path)).unwrap();
        assert_eq!(settings.concurrency, 50);
        assert_eq!(settings.per_host_concurrency(), 200);
        assert!(settings.skip_addresses.is_empty());
        assert_eq!(settings.timeout_secs, 2);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = AppSettings::load(Some(Path::new("/nonexistent/settings.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFailed { .. }));
    }

    #[test]
    fn test_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            AppSettings::load_from(&path),
            Err(ConfigError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_truncation_policy_from_settings() {
        let settings = AppSettings {
            truncate_threshold: 5,
            fallback_ports: "8080,8443".into(),
            ..AppSettings::default()
        };
        let policy = settings.truncation_policy().unwrap();
        assert_eq!(policy.threshold, 5);
        assert_eq!(policy.fallback_ports.len(), 2);

        let bad = AppSettings {
            fallback_ports: "http".into(),
            ..AppSettings::default()
        };
        assert!(matches!(
            bad.truncation_policy(),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_resolve_options_from_settings() {
        let settings = AppSettings {
            retries: 0,
            retry_delay_secs: 0,
            ..AppSettings::default()
        };
        let options = settings.resolve_options();
        assert_eq!(options.retries, 0);
        assert!(options.delay.is_zero());
        assert!(options.filter.blocks(&"127.0.0.2".parse().unwrap()));
    }

    #[test]
    fn test_settings_serialization() {
        let settings = AppSettings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let parsed: AppSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, settings);
    }
}
