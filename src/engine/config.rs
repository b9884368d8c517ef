//! Engine configuration.

use crate::error::{EngineError, EngineResult};
use crate::probe::udp::{MAX_RETRANSMISSIONS, RETRANSMISSION_INTERVAL};
use crate::probe::UdpSilencePolicy;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Default per-probe timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

/// Default number of probes in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 64;

/// Tunables for one [`ReachabilityEngine`](super::ReachabilityEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Per-probe timeout, measured from the probe's own launch.
    pub timeout: Duration,
    /// Maximum probes in flight.
    pub concurrency: usize,
    /// Bound on the whole run; stragglers are recorded as timeouts.
    pub run_timeout: Option<Duration>,
    /// Probe launches per second, 0 for unlimited.
    pub rate_limit: u32,
    /// How UDP silence is reported.
    pub udp_policy: UdpSilencePolicy,
    /// Require the TCP echo exchange, not just the handshake.
    pub tcp_echo: bool,
    /// Interval between UDP request retransmissions.
    pub udp_retransmit_interval: Duration,
    /// Retransmissions after the first UDP request.
    pub udp_max_retransmissions: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
            run_timeout: None,
            rate_limit: 0,
            udp_policy: UdpSilencePolicy::default(),
            tcp_echo: false,
            udp_retransmit_interval: RETRANSMISSION_INTERVAL,
            udp_max_retransmissions: MAX_RETRANSMISSIONS,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-probe timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the concurrency cap.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Bound the total wall time of a run.
    pub fn with_run_timeout(mut self, run_timeout: Option<Duration>) -> Self {
        self.run_timeout = run_timeout;
        self
    }

    /// Set the launch rate limit (0 = unlimited).
    pub fn with_rate_limit(mut self, rate: u32) -> Self {
        self.rate_limit = rate;
        self
    }

    pub fn with_udp_policy(mut self, policy: UdpSilencePolicy) -> Self {
        self.udp_policy = policy;
        self
    }

    pub fn with_tcp_echo(mut self, echo: bool) -> Self {
        self.tcp_echo = echo;
        self
    }

    /// Set the UDP retransmission schedule.
    pub fn with_udp_retransmit(mut self, interval: Duration, max_retransmissions: u32) -> Self {
        self.udp_retransmit_interval = interval;
        self.udp_max_retransmissions = max_retransmissions;
        self
    }

    /// Reject settings no run could work with.
    pub fn validate(&self) -> EngineResult<()> {
        if self.concurrency == 0 {
            return Err(EngineError::InvalidConfiguration(
                "concurrency must be at least 1".into(),
            ));
        }
        if self.concurrency > Semaphore::MAX_PERMITS {
            return Err(EngineError::InvalidConfiguration(format!(
                "concurrency must not exceed {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.timeout.is_zero() {
            return Err(EngineError::InvalidConfiguration(
                "probe timeout must be non-zero".into(),
            ));
        }
        if self.run_timeout.is_some_and(|t| t.is_zero()) {
            return Err(EngineError::InvalidConfiguration(
                "run timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
