//! Application settings and paths.
//!
//! Settings live in a JSON file under the XDG config directory
//! (`~/.config/netreach/settings.json` on Linux). A missing file means
//! defaults; command-line flags override whatever is loaded.

use crate::engine::{EngineConfig, DEFAULT_CONCURRENCY};
use crate::error::{ConfigError, ConfigResult};
use crate::probe::UdpSilencePolicy;
use crate::types::PortList;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Ports probed when nothing else is configured.
pub const DEFAULT_PORTS: [u16; 6] = [4230, 2708, 891, 519, 80, 443];

/// Application directory paths.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/netreach)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Locate the XDG directories for this application.
    pub fn new() -> ConfigResult<Self> {
        let project = ProjectDirs::from("com", "netreach", "netreach")
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
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Host tested when none is given.
    pub default_host: String,
    /// Ports tested when none are given.
    pub default_ports: Vec<u16>,
    /// Per-probe timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum probes in flight.
    pub concurrency: usize,
    /// Bound on a whole run in milliseconds, 0 for none.
    pub run_timeout_ms: u64,
    /// Probe launches per second, 0 for unlimited.
    pub rate_limit: u32,
    /// How UDP silence is reported.
    pub udp_policy: UdpSilencePolicy,
    /// Require a TCP echo from the peer.
    pub tcp_echo: bool,
    /// Default output format.
    pub output_format: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            default_host: "localhost".to_string(),
            default_ports: DEFAULT_PORTS.to_vec(),
            timeout_ms: 3000,
            concurrency: DEFAULT_CONCURRENCY,
            run_timeout_ms: 0,
            rate_limit: 0,
            udp_policy: UdpSilencePolicy::AssumeOpen,
            tcp_echo: false,
            output_format: "plain".to_string(),
        }
    }
}

impl AppSettings {
    /// Load settings from the default location.
    pub fn load() -> ConfigResult<Self> {
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

        let settings: Self =
            serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to a specific file, creating parent directories.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Check values that cannot be expressed in the types.
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.default_ports.is_empty() {
            PortList::from_raw(self.default_ports.iter().copied())
                .map_err(|e| ConfigError::InvalidFormat(format!("default_ports: {e}")))?;
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::InvalidFormat("timeout_ms must be non-zero".into()));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidFormat("concurrency must be non-zero".into()));
        }
        self.engine_config()
            .validate()
            .map_err(|e| ConfigError::InvalidFormat(e.to_string()))
    }

    /// Engine configuration derived from these settings.
    pub fn engine_config(&self) -> EngineConfig {
        let run_timeout =
            (self.run_timeout_ms > 0).then(|| Duration::from_millis(self.run_timeout_ms));
        EngineConfig::new()
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_concurrency(self.concurrency)
            .with_run_timeout(run_timeout)
            .with_rate_limit(self.rate_limit)
            .with_udp_policy(self.udp_policy)
            .with_tcp_echo(self.tcp_echo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let settings = AppSettings::default();
        assert_eq!(settings.default_host, "localhost");
        assert_eq!(settings.default_ports, vec![4230, 2708, 891, 519, 80, 443]);
        assert_eq!(settings.timeout_ms, 3000);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = AppSettings {
            default_host: "192.0.2.10".into(),
            udp_policy: UdpSilencePolicy::AssumeClosed,
            run_timeout_ms: 5000,
            ..AppSettings::default()
        };
        settings.save_to(&path).unwrap();

        let loaded = AppSettings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "timeout_ms": 750, "udp_policy": "closed" }}"#).unwrap();

        let loaded = AppSettings::load_from(file.path()).unwrap();
        assert_eq!(loaded.timeout_ms, 750);
        assert_eq!(loaded.udp_policy, UdpSilencePolicy::AssumeClosed);
        assert_eq!(loaded.concurrency, DEFAULT_CONCURRENCY);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "default_ports": [80, 0] }}"#).unwrap();
        assert!(matches!(
            AppSettings::load_from(file.path()),
            Err(ConfigError::InvalidFormat(_))
        ));

        let huge = AppSettings {
            concurrency: usize::MAX,
            ..AppSettings::default()
        };
        assert!(matches!(huge.validate(), Err(ConfigError::InvalidFormat(_))));

        let missing = Path::new("/nonexistent/netreach/settings.json");
        assert!(matches!(
            AppSettings::load_from(missing),
            Err(ConfigError::ReadFailed { .. })
        ));
    }

    #[test]
    fn test_engine_config_mapping() {
        let settings = AppSettings {
            timeout_ms: 1500,
            run_timeout_ms: 0,
            tcp_echo: true,
            ..AppSettings::default()
        };
        let config = settings.engine_config();
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.run_timeout, None);
        assert!(config.tcp_echo);
    }
}
