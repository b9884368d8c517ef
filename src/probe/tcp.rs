//! TCP reachability probe.
//!
//! Performs a standard connect using the operating system's socket API.
//! With the echo check enabled the probe additionally pushes a fixed buffer
//! through the connection and waits for the peer to send it back, which only
//! a cooperating reflector does.

use crate::error::ProbeError;
use crate::probe::traits::{Probe, ProbeResult, Protocol};
use crate::probe::wire::{tcp_echo_payload, TCP_ECHO_LEN};
use crate::types::{Port, Target};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpSocket, TcpStream};
use tokio::time::timeout_at;
use tracing::debug;

/// TCP connect probe.
///
/// The socket lives inside the probe future; a timeout, an error or the
/// future being dropped all close it.
#[derive(Debug, Clone, Default)]
pub struct TcpProbe {
    echo: bool,
}

impl TcpProbe {
    /// Create a probe that succeeds on handshake completion.
    pub fn new() -> Self {
        Self { echo: false }
    }

    /// Require an echo of the reachability buffer after connecting.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    async fn connect(target: &Target, addr: SocketAddr) -> std::io::Result<TcpStream> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        if target.bind.is_some() {
            socket.bind(target.local_addr())?;
        }
        socket.set_nodelay(true)?;
        socket.connect(addr).await
    }

    async fn echo_exchange(stream: &mut TcpStream) -> std::io::Result<()> {
        let payload = tcp_echo_payload();
        stream.write_all(&payload).await?;

        let mut buf = vec![0u8; TCP_ECHO_LEN];
        stream.read_exact(&mut buf).await?;
        Ok(())
    }

    async fn attempt(
        &self,
        target: &Target,
        port: Port,
        deadline: tokio::time::Instant,
    ) -> Result<(), ProbeError> {
        let addr = target.socket_addr(port);

        let mut stream = match timeout_at(deadline, Self::connect(target, addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(ProbeError::from_io(&e)),
            Err(_) => return Err(ProbeError::Timeout),
        };
        debug!(%addr, "tcp handshake completed");

        if self.echo {
            match timeout_at(deadline, Self::echo_exchange(&mut stream)).await {
                Ok(Ok(())) => debug!(%addr, "tcp echo completed"),
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Err(ProbeError::Io("connection closed before echo completed".into()))
                }
                Ok(Err(e)) => return Err(ProbeError::from_io(&e)),
                Err(_) => return Err(ProbeError::Timeout),
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Probe for TcpProbe {
    fn protocol(&self) -> Protocol {
        Protocol::Tcp
    }

    async fn probe(&self, target: &Target, port: Port, timeout: Duration) -> ProbeResult {
        let start = Instant::now();
        let deadline = tokio::time::Instant::now() + timeout;

        match self.attempt(target, port, deadline).await {
            Ok(()) => ProbeResult::reachable(port, Protocol::Tcp).with_latency(start.elapsed()),
            Err(error) => {
                debug!(%port, %error, "tcp probe failed");
                ProbeResult::unreachable(port, Protocol::Tcp, error).with_latency(start.elapsed())
            }
        }
    }
}
