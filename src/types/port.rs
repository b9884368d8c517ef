//! Port types with validation and parsing.
//!
//! The `Port` newtype ensures values are always valid port numbers (1-65535).
//! `PortList` keeps ports in the order the caller gave them, which is the
//! order every reachability report is aligned to.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// A validated network port number (1-65535).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Port(u16);

impl Port {
    /// Minimum valid port number.
    pub const MIN: u16 = 1;
    /// Maximum valid port number.
    pub const MAX: u16 = 65535;

    /// Create a new Port from a u16, returning None if invalid.
    #[inline]
    pub const fn new(port: u16) -> Option<Self> {
        if port >= Self::MIN {
            Some(Self(port))
        } else {
            None
        }
    }

    /// Get the raw port number.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for Port {
    type Error = PortError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(PortError::OutOfRange(u32::from(value)))
    }
}

impl TryFrom<u32> for Port {
    type Error = PortError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        u16::try_from(value)
            .ok()
            .and_then(Self::new)
            .ok_or(PortError::OutOfRange(value))
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

/// Error type for port parsing and validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("port {0} is out of valid range (1-65535)")]
    OutOfRange(u32),
    #[error("invalid port number: {0}")]
    InvalidFormat(String),
    #[error("invalid port range: start ({0}) > end ({1})")]
    InvalidRange(u16, u16),
    #[error("empty port list")]
    Empty,
}

/// An ordered, duplicate-free list of ports.
///
/// Duplicates are dropped on insertion; the first occurrence keeps its
/// position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortList {
    ports: Vec<Port>,
}

impl PortList {
    /// Create an empty list.
    pub const fn new() -> Self {
        Self { ports: Vec::new() }
    }

    /// Validate raw port numbers and deduplicate them in input order.
    ///
    /// Fails on the first out-of-range value and on an empty input.
    pub fn from_raw<I>(raw: I) -> Result<Self, PortError>
    where
        I: IntoIterator,
        I::Item: Into<u32>,
    {
        let mut list = Self::new();
        let mut seen = HashSet::new();
        for value in raw {
            let value: u32 = value.into();
            let port = Port::try_from(value)?;
            if seen.insert(port) {
                list.ports.push(port);
            }
        }
        if list.is_empty() {
            return Err(PortError::Empty);
        }
        Ok(list)
    }

    /// Number of distinct ports.
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Port> + '_ {
        self.ports.iter().copied()
    }

    pub fn as_slice(&self) -> &[Port] {
        &self.ports
    }

    /// Raw port numbers in list order.
    pub fn to_u16s(&self) -> Vec<u16> {
        self.ports.iter().map(|p| p.as_u16()).collect()
    }
}

impl FromStr for PortList {
    type Err = PortError;

    /// Parse "80", "80,443", "1-100" or mixed forms such as "22,80,8000-8010".
    ///
    /// Ranges expand in ascending order; the list order otherwise follows the
    /// text.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PortError::Empty);
        }

        let mut raw: Vec<u32> = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            match part.split_once('-') {
                Some((start, end)) => {
                    let start = parse_port(start)?;
                    let end = parse_port(end)?;
                    if start > end {
                        return Err(PortError::InvalidRange(start.as_u16(), end.as_u16()));
                    }
                    raw.extend((start.as_u16()..=end.as_u16()).map(u32::from));
                }
                None => raw.push(u32::from(parse_port(part)?.as_u16())),
            }
        }

        Self::from_raw(raw)
    }
}

fn parse_port(text: &str) -> Result<Port, PortError> {
    let text = text.trim();
    let value: u32 = text
        .parse()
        .map_err(|_| PortError::InvalidFormat(text.to_string()))?;
    Port::try_from(value)
}

impl fmt::Display for PortList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.ports.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}
