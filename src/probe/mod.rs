//! Probe module - single-port, single-protocol reachability checks.
//!
//! Each probe owns its socket for exactly as long as its future runs and
//! reports every outcome, including failures, as a [`ProbeResult`].

pub mod tcp;
pub mod traits;
pub mod udp;
pub mod wire;

pub use tcp::TcpProbe;
pub use traits::{Probe, ProbeResult, Protocol, SharedProbe};
pub use udp::{UdpProbe, UdpSilencePolicy};
