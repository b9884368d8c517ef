//! Target specification and resolution.
//!
//! A target is a single host: an IP literal or a hostname, plus an optional
//! local source address that every probe binds to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use trust_dns_resolver::config::{LookupIpStrategy, ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

use super::Port;

/// Error type for target parsing and resolution.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TargetError {
    #[error("empty target")]
    Empty,
    #[error("invalid target format: {0}")]
    InvalidFormat(String),
    #[error("failed to resolve hostname '{0}': {1}")]
    DnsResolutionFailed(String, String),
    #[error("no IP addresses found for hostname '{0}'")]
    NoAddressesFound(String),
    #[error("bind address {bind} does not match the address family of {target}")]
    FamilyMismatch { target: IpAddr, bind: IpAddr },
}

/// A resolved reachability target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// The original input (hostname or IP string).
    pub host: String,
    /// The resolved IP address.
    pub ip: IpAddr,
    /// Local address probes bind to, if constrained.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<IpAddr>,
}

impl Target {
    /// Create a target from an already known address.
    pub fn new(host: impl Into<String>, ip: IpAddr) -> Self {
        Self {
            host: host.into(),
            ip,
            bind: None,
        }
    }

    /// Constrain probes to a local source address.
    pub fn with_bind(mut self, bind: IpAddr) -> Result<Self, TargetError> {
        if bind.is_ipv4() != self.ip.is_ipv4() {
            return Err(TargetError::FamilyMismatch {
                target: self.ip,
                bind,
            });
        }
        self.bind = Some(bind);
        Ok(self)
    }

    /// Resolve a host string to a target.
    ///
    /// IP literals are used directly; hostnames go through the system
    /// resolver configuration and the first address wins, IPv4 preferred.
    pub async fn resolve(host: &str) -> Result<Self, TargetError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(TargetError::Empty);
        }

        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(Self::new(host, ip));
        }

        if !is_valid_hostname(host) {
            return Err(TargetError::InvalidFormat(host.to_string()));
        }

        let resolver = match TokioAsyncResolver::tokio_from_system_conf() {
            Ok(resolver) => resolver,
            Err(e) => {
                tracing::debug!(error = %e, "system resolver config unavailable, using defaults");
                let mut opts = ResolverOpts::default();
                opts.ip_strategy = LookupIpStrategy::Ipv4thenIpv6;
                TokioAsyncResolver::tokio(ResolverConfig::default(), opts)
            }
        };

        let response = resolver
            .lookup_ip(host)
            .await
            .map_err(|e| TargetError::DnsResolutionFailed(host.to_string(), e.to_string()))?;

        let mut ips: Vec<IpAddr> = response.iter().collect();
        ips.sort_by_key(|ip| ip.is_ipv6());
        let ip = ips
            .first()
            .copied()
            .ok_or_else(|| TargetError::NoAddressesFound(host.to_string()))?;

        tracing::debug!(%host, %ip, "resolved target");
        Ok(Self::new(host, ip))
    }

    /// Socket address of a port on this target.
    pub fn socket_addr(&self, port: Port) -> SocketAddr {
        SocketAddr::new(self.ip, port.as_u16())
    }

    /// Local address to bind probe sockets to (ephemeral port).
    pub fn local_addr(&self) -> SocketAddr {
        let ip = self.bind.unwrap_or(if self.ip.is_ipv4() {
            IpAddr::from([0, 0, 0, 0])
        } else {
            IpAddr::from([0u16; 8])
        });
        SocketAddr::new(ip, 0)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host == self.ip.to_string() {
            write!(f, "{}", self.ip)
        } else {
            write!(f, "{} ({})", self.host, self.ip)
        }
    }
}

/// Check if a string is a valid hostname.
fn is_valid_hostname(s: &str) -> bool {
    if s.is_empty() || s.len() > 253 {
        return false;
    }

    s.trim_end_matches('.').split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && label.starts_with(|c: char| c.is_ascii_alphanumeric())
            && label.ends_with(|c: char| c.is_ascii_alphanumeric())
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}
