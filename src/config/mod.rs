//! Configuration management for netreach.
//!
//! Provides XDG-compliant storage of application settings.

mod settings;

pub use settings::{AppSettings, Paths, DEFAULT_PORTS};
