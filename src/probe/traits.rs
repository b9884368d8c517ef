//! Probe trait abstraction.
//!
//! Defines the result record every probe produces and a common interface
//! for the TCP and UDP implementations, so the engine (and tests) can swap
//! in any implementation.

use crate::error::ProbeError;
use crate::types::{Port, Target};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Transport protocol a probe exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    /// Both protocols, in report order.
    pub const ALL: [Protocol; 2] = [Protocol::Tcp, Protocol::Udp];
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

/// Outcome of one probe against one port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// The port that was probed.
    pub port: Port,
    /// Protocol used.
    pub protocol: Protocol,
    /// Whether the port is considered reachable.
    pub reachable: bool,
    /// Why the probe failed, when it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProbeError>,
    /// Reachability was inferred from silence rather than observed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub inferred: bool,
    /// Time until the deciding event, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl ProbeResult {
    /// A probe that observed the port answering.
    pub fn reachable(port: Port, protocol: Protocol) -> Self {
        Self {
            port,
            protocol,
            reachable: true,
            error: None,
            inferred: false,
            latency_ms: None,
        }
    }

    /// A probe that did not reach the port.
    pub fn unreachable(port: Port, protocol: Protocol, error: ProbeError) -> Self {
        Self {
            port,
            protocol,
            reachable: false,
            error: Some(error),
            inferred: false,
            latency_ms: None,
        }
    }

    /// A probe that saw no negative signal and assumes the port is open.
    pub fn assumed_open(port: Port, protocol: Protocol) -> Self {
        Self {
            inferred: true,
            ..Self::reachable(port, protocol)
        }
    }

    /// Set the latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency_ms = Some(latency.as_millis() as u64);
        self
    }
}

/// A single-protocol reachability probe.
///
/// Implementations never fail: every way a probe can go wrong ends up in
/// the returned [`ProbeResult`]. Dropping the returned future must release
/// any socket the probe holds.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Protocol this probe exercises.
    fn protocol(&self) -> Protocol;

    /// Probe one port of the target, giving up after `timeout`.
    async fn probe(&self, target: &Target, port: Port, timeout: Duration) -> ProbeResult;
}

/// A shared probe for dynamic dispatch across tasks.
pub type SharedProbe = std::sync::Arc<dyn Probe>;
