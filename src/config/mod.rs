//! Configuration management for portsweep.
//!
//! Provides XDG-compliant settings storage with defaults for every option.

mod settings;

pub use settings::{AppSettings, Paths};
