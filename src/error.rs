//! Error types for netreach.
//!
//! Uses `thiserror` for ergonomic error definitions. Probe failures are
//! plain data carried inside results; the other enums are real failures.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::types::{PortError, TargetError};

/// Why a single probe did not prove reachability.
///
/// Stored in [`ProbeResult::error`](crate::probe::ProbeResult) and never
/// returned to the caller of the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "reason")]
pub enum ProbeError {
    #[error("connection refused")]
    ConnectionRefused,

    #[error("host unreachable")]
    HostUnreachable,

    #[error("timed out")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(String),
}

impl ProbeError {
    /// Classify an I/O error raised by a socket operation.
    pub fn from_io(err: &io::Error) -> Self {
        if err.kind() == io::ErrorKind::ConnectionRefused {
            return Self::ConnectionRefused;
        }
        if err.kind() == io::ErrorKind::TimedOut {
            return Self::Timeout;
        }

        #[cfg(unix)]
        if let Some(code) = err.raw_os_error() {
            if code == libc::EHOSTUNREACH || code == libc::ENETUNREACH {
                return Self::HostUnreachable;
            }
        }

        let text = err.to_string().to_lowercase();
        if text.contains("unreachable") {
            Self::HostUnreachable
        } else {
            Self::Io(err.to_string())
        }
    }
}

/// Errors surfaced by [`ReachabilityEngine`](crate::engine::ReachabilityEngine).
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("a reachability test is already running on this engine")]
    Busy,

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("test run failed: {0}")]
    RunFailed(String),
}

impl From<PortError> for EngineError {
    fn from(err: PortError) -> Self {
        Self::InvalidConfiguration(err.to_string())
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors from loading or saving settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine the configuration directory")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("failed to write {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("invalid settings file: {0}")]
    InvalidFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors reported by the command-line front end.
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Port(#[from] PortError),

    #[error(transparent)]
    Target(#[from] TargetError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for CLI handlers.
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_refused() {
        let err = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(ProbeError::from_io(&err), ProbeError::ConnectionRefused);
    }

    #[cfg(unix)]
    #[test]
    fn test_classify_unreachable_errno() {
        let err = io::Error::from_raw_os_error(libc::EHOSTUNREACH);
        assert_eq!(ProbeError::from_io(&err), ProbeError::HostUnreachable);

        let err = io::Error::from_raw_os_error(libc::ENETUNREACH);
        assert_eq!(ProbeError::from_io(&err), ProbeError::HostUnreachable);
    }

    #[test]
    fn test_classify_other() {
        let err = io::Error::new(io::ErrorKind::AddrInUse, "address in use");
        assert!(matches!(ProbeError::from_io(&err), ProbeError::Io(_)));
    }

    #[test]
    fn test_probe_error_serialization() {
        let json = serde_json::to_string(&ProbeError::Timeout).unwrap();
        assert_eq!(json, r#"{"kind":"timeout"}"#);
    }
}
