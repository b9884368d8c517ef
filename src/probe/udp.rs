//! UDP reachability probe.
//!
//! UDP is connectionless, so reachability is inferred from what comes back:
//!
//! 1. **Reply datagram**: the port is reachable
//! 2. **ICMP unreachable** (surfaced by the kernel as a socket error on a
//!    connected socket): the port is not reachable
//! 3. **Silence**: ambiguous; resolved by [`UdpSilencePolicy`]
//!
//! The request is retransmitted at a fixed interval until something comes
//! back, the retransmission budget is spent, or the timeout expires.

use crate::error::ProbeError;
use crate::probe::traits::{Probe, ProbeResult, Protocol};
use crate::probe::wire::{Ack, Request};
use crate::types::{Port, Target};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use socket2::{Domain, Socket, Type};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::timeout_at;
use tracing::{debug, trace};

/// Delay between retransmissions of the reachability request.
pub const RETRANSMISSION_INTERVAL: Duration = Duration::from_millis(200);

/// Retransmissions after the first request.
pub const MAX_RETRANSMISSIONS: u32 = 10;

/// How a UDP probe reports a port that never answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum UdpSilencePolicy {
    /// Silence counts as reachable, flagged as inferred.
    #[default]
    #[value(name = "open")]
    #[serde(rename = "open")]
    AssumeOpen,
    /// Silence counts as a timeout.
    #[value(name = "closed")]
    #[serde(rename = "closed")]
    AssumeClosed,
}

impl fmt::Display for UdpSilencePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AssumeOpen => write!(f, "open"),
            Self::AssumeClosed => write!(f, "closed"),
        }
    }
}

/// UDP reachability probe.
#[derive(Debug, Clone)]
pub struct UdpProbe {
    policy: UdpSilencePolicy,
    retransmit_interval: Duration,
    max_retransmissions: u32,
}

impl Default for UdpProbe {
    fn default() -> Self {
        Self::new()
    }
}

enum Outcome {
    Reply,
    Negative(ProbeError),
    Silence,
}

impl UdpProbe {
    /// Create a probe with the default retransmission schedule.
    pub fn new() -> Self {
        Self {
            policy: UdpSilencePolicy::default(),
            retransmit_interval: RETRANSMISSION_INTERVAL,
            max_retransmissions: MAX_RETRANSMISSIONS,
        }
    }

    /// Set the silence policy.
    pub fn with_policy(mut self, policy: UdpSilencePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the retransmission schedule.
    pub fn with_retransmit(mut self, interval: Duration, max_retransmissions: u32) -> Self {
        self.retransmit_interval = interval.max(Duration::from_millis(1));
        self.max_retransmissions = max_retransmissions;
        self
    }

    /// Open a non-blocking socket bound to the target's local address and
    /// connected to the probed port, so ICMP errors reach us.
    async fn open_socket(target: &Target, port: Port) -> std::io::Result<UdpSocket> {
        let local = target.local_addr();
        let socket = Socket::new(Domain::for_address(local), Type::DGRAM, None)?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&local.into())?;

        let socket = UdpSocket::from_std(socket.into())?;
        socket.connect(target.socket_addr(port)).await?;
        Ok(socket)
    }

    async fn exchange(&self, socket: &UdpSocket, deadline: tokio::time::Instant) -> Outcome {
        let request = Request {
            packet_id: random_packet_id(),
            timestamp_ms: chrono::Utc::now().timestamp_millis() as u32,
        };
        let datagram = request.encode();
        let mut buf = [0u8; 1500];
        let mut sent = 0u32;

        loop {
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Outcome::Silence;
            }

            let wait_until = if sent <= self.max_retransmissions {
                if let Err(e) = socket.send(&datagram).await {
                    return Outcome::Negative(ProbeError::from_io(&e));
                }
                sent += 1;
                trace!(packet_id = request.packet_id, attempt = sent, "udp request sent");
                (now + self.retransmit_interval).min(deadline)
            } else {
                deadline
            };

            match timeout_at(wait_until, socket.recv(&mut buf)).await {
                Ok(Ok(n)) => {
                    match Ack::decode(&buf[..n]) {
                        Some(ack) if ack.packet_id == request.packet_id => {
                            debug!(hold_ms = ack.hold_ms, "udp ack matched request");
                        }
                        _ => debug!(bytes = n, "udp reply from non-reflector service"),
                    }
                    return Outcome::Reply;
                }
                Ok(Err(e)) => return Outcome::Negative(ProbeError::from_io(&e)),
                Err(_) => continue,
            }
        }
    }
}

fn random_packet_id() -> u32 {
    loop {
        let id: u32 = rand::random();
        if id != 0 {
            return id;
        }
    }
}

#[async_trait]
impl Probe for UdpProbe {
    fn protocol(&self) -> Protocol {
        Protocol::Udp
    }

    async fn probe(&self, target: &Target, port: Port, timeout: Duration) -> ProbeResult {
        let start = Instant::now();
        let deadline = tokio::time::Instant::now() + timeout;

        let socket = match Self::open_socket(target, port).await {
            Ok(socket) => socket,
            Err(e) => {
                debug!(%port, error = %e, "udp socket setup failed");
                return ProbeResult::unreachable(port, Protocol::Udp, ProbeError::from_io(&e));
            }
        };

        let result = match self.exchange(&socket, deadline).await {
            Outcome::Reply => ProbeResult::reachable(port, Protocol::Udp),
            Outcome::Negative(error) => {
                debug!(%port, %error, "udp probe got negative signal");
                ProbeResult::unreachable(port, Protocol::Udp, error)
            }
            Outcome::Silence => match self.policy {
                UdpSilencePolicy::AssumeOpen => ProbeResult::assumed_open(port, Protocol::Udp),
                UdpSilencePolicy::AssumeClosed => {
                    ProbeResult::unreachable(port, Protocol::Udp, ProbeError::Timeout)
                }
            },
        };

        result.with_latency(start.elapsed())
    }
}
