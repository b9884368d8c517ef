//! Core type definitions using newtype patterns for type safety.

mod port;
mod run_id;
mod target;

pub use port::{Port, PortError, PortList};
pub use run_id::RunId;
pub use target::{Target, TargetError};
