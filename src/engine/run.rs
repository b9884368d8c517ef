//! Test run bookkeeping and the aggregate report.

use crate::error::ProbeError;
use crate::probe::{ProbeResult, Protocol};
use crate::types::{Port, PortList, RunId, Target};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Instant;

/// Lifecycle of a [`TestRun`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Pending,
    Running,
    Completed,
    Cancelled,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Contract violations while driving a run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    #[error("cannot move test run from {from} to {to}")]
    InvalidTransition { from: RunState, to: RunState },
    #[error("result for {protocol}/{port} already recorded")]
    DuplicateResult { port: Port, protocol: Protocol },
    #[error("port {0} is not part of this run")]
    UnknownPort(Port),
    #[error("{0} probe results still missing")]
    Incomplete(usize),
}

/// One reachability test in progress.
///
/// Results are write-once per (port, protocol) slot.
#[derive(Debug)]
pub struct TestRun {
    id: RunId,
    target: Target,
    ports: PortList,
    members: HashSet<Port>,
    results: HashMap<(Port, Protocol), ProbeResult>,
    state: RunState,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl TestRun {
    pub fn new(target: Target, ports: PortList) -> Self {
        Self {
            id: RunId::new(),
            target,
            results: HashMap::with_capacity(ports.len() * Protocol::ALL.len()),
            members: ports.iter().collect(),
            ports,
            state: RunState::Pending,
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn ports(&self) -> &PortList {
        &self.ports
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Number of probes this run needs.
    pub fn expected(&self) -> usize {
        self.ports.len() * Protocol::ALL.len()
    }

    pub fn recorded(&self) -> usize {
        self.results.len()
    }

    fn transition(&mut self, from: RunState, to: RunState) -> Result<(), RunError> {
        if self.state != from {
            return Err(RunError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    /// Pending -> Running.
    pub fn start(&mut self) -> Result<(), RunError> {
        self.transition(RunState::Pending, RunState::Running)?;
        self.started_at = Utc::now();
        self.started = Instant::now();
        Ok(())
    }

    /// Running -> Cancelled.
    pub fn cancel(&mut self) -> Result<(), RunError> {
        self.transition(RunState::Running, RunState::Cancelled)
    }

    /// Store a probe result. The first result for a slot wins.
    pub fn record(&mut self, result: ProbeResult) -> Result<(), RunError> {
        if self.state != RunState::Running {
            return Err(RunError::InvalidTransition {
                from: self.state,
                to: RunState::Running,
            });
        }
        if !self.members.contains(&result.port) {
            return Err(RunError::UnknownPort(result.port));
        }

        let key = (result.port, result.protocol);
        if self.results.contains_key(&key) {
            return Err(RunError::DuplicateResult {
                port: result.port,
                protocol: result.protocol,
            });
        }
        self.results.insert(key, result);
        Ok(())
    }

    /// Slots without a result, in port order.
    pub fn missing(&self) -> Vec<(Port, Protocol)> {
        self.ports
            .iter()
            .flat_map(|port| Protocol::ALL.into_iter().map(move |proto| (port, proto)))
            .filter(|key| !self.results.contains_key(key))
            .collect()
    }

    /// Record `error` for every slot still empty.
    pub fn fill_missing(&mut self, error: ProbeError) -> Result<usize, RunError> {
        let missing = self.missing();
        for &(port, protocol) in &missing {
            self.record(ProbeResult::unreachable(port, protocol, error.clone()))?;
        }
        Ok(missing.len())
    }

    /// Running -> Completed, producing the report.
    pub fn complete(&mut self) -> Result<ReachabilityReport, RunError> {
        let missing = self.expected() - self.recorded();
        if missing > 0 {
            return Err(RunError::Incomplete(missing));
        }
        self.transition(RunState::Running, RunState::Completed)?;

        let mut ports = Vec::with_capacity(self.ports.len());
        let mut tcp_reachable = Vec::with_capacity(self.ports.len());
        let mut udp_reachable = Vec::with_capacity(self.ports.len());
        let mut results = Vec::with_capacity(self.expected());

        for port in self.ports.iter() {
            ports.push(port.as_u16());
            for protocol in Protocol::ALL {
                let result = self
                    .results
                    .remove(&(port, protocol))
                    .ok_or(RunError::Incomplete(1))?;
                match protocol {
                    Protocol::Tcp => tcp_reachable.push(result.reachable),
                    Protocol::Udp => udp_reachable.push(result.reachable),
                }
                results.push(result);
            }
        }

        Ok(ReachabilityReport {
            run_id: self.id,
            target: self.target.host.clone(),
            ip_address: self.target.ip.to_string(),
            started_at: self.started_at,
            completed_at: Utc::now(),
            duration_ms: self.started.elapsed().as_millis() as u64,
            ports,
            tcp_reachable,
            udp_reachable,
            results,
        })
    }
}

/// Aggregate outcome of a completed run.
///
/// `ports`, `tcp_reachable` and `udp_reachable` are index-aligned and follow
/// the deduplicated input order. `results` holds the full records, TCP then
/// UDP for each port, in the same order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReachabilityReport {
    pub run_id: RunId,
    pub target: String,
    pub ip_address: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub ports: Vec<u16>,
    pub tcp_reachable: Vec<bool>,
    pub udp_reachable: Vec<bool>,
    pub results: Vec<ProbeResult>,
}

impl ReachabilityReport {
    /// The record for one (port, protocol) pair.
    pub fn get(&self, port: u16, protocol: Protocol) -> Option<&ProbeResult> {
        self.results
            .iter()
            .find(|r| r.port.as_u16() == port && r.protocol == protocol)
    }

    /// Number of ports reachable over `protocol`.
    pub fn reachable_count(&self, protocol: Protocol) -> usize {
        let flags = match protocol {
            Protocol::Tcp => &self.tcp_reachable,
            Protocol::Udp => &self.udp_reachable,
        };
        flags.iter().filter(|&&r| r).count()
    }
}
