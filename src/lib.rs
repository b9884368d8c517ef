//! # netreach - TCP and UDP Port Reachability Testing
//!
//! netreach checks whether a host accepts TCP connections and answers UDP
//! datagrams on a list of ports. Every port is probed over both protocols
//! concurrently and the outcome is delivered as one aggregate report.
//!
//! ## Features
//!
//! - **Concurrent Probing**: One TCP and one UDP probe per port, bounded by a
//!   concurrency cap and an optional rate limit
//! - **Single Aggregate Report**: Results ordered by the input port list,
//!   regardless of which probe finished first
//! - **Cancellation**: Abort a run and release its sockets at any time
//! - **Reflector**: A cooperating server that echoes TCP and acknowledges UDP
//! - **Multiple Output Formats**: Plain text, JSON, and CSV
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use netreach::engine::{EngineConfig, ReachabilityEngine, ReachabilityReport};
//! use netreach::types::Target;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = ReachabilityEngine::new(EngineConfig::default());
//!     let target = Target::resolve("localhost").await?;
//!
//!     let handle = engine.run_test(target, &[80, 443], Arc::new(|report: &ReachabilityReport| {
//!         println!("tcp: {:?} udp: {:?}", report.tcp_reachable, report.udp_reachable);
//!     }))?;
//!     handle.wait().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Port, port list, target and run id newtypes
//! - [`probe`] - The `Probe` trait with TCP and UDP implementations
//! - [`engine`] - Run coordination, cancellation and the aggregate report
//! - [`reflector`] - Server side answering reachability probes
//! - [`config`] - Settings file handling
//! - [`output`] - Report formatting
//! - [`error`] - Error types

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod output;
pub mod probe;
pub mod reflector;
pub mod types;

// Re-export commonly used types
pub use engine::{
    EngineConfig, ReachabilityEngine, ReachabilityReport, ResultListener, RunHandle, RunOutcome,
};
pub use error::{CliError, EngineError, ProbeError};
pub use probe::{Probe, ProbeResult, Protocol, UdpSilencePolicy};
pub use types::{Port, PortList, RunId, Target};
