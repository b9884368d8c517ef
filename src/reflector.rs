//! Reflector - the cooperating server side of a reachability test.
//!
//! Listens on the same port numbers over TCP and UDP. TCP connections are
//! echoed back byte for byte; UDP reachability requests are answered with
//! an [`Ack`]. Anything else arriving over UDP is ignored.

use crate::probe::wire::{Ack, Request};
use crate::types::{Port, PortList};
use futures::future::try_join_all;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Idle limit for an echoed TCP connection.
const TCP_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// A bound set of TCP listeners and UDP sockets.
pub struct Reflector {
    tcp: Vec<TcpListener>,
    udp: Vec<UdpSocket>,
}

impl Reflector {
    /// Bind every port on `ip` for both protocols.
    pub async fn bind(ip: IpAddr, ports: &PortList) -> io::Result<Self> {
        let addrs: Vec<SocketAddr> = ports
            .iter()
            .map(|p| SocketAddr::new(ip, p.as_u16()))
            .collect();

        let tcp = try_join_all(addrs.iter().map(|addr| TcpListener::bind(*addr))).await?;
        let udp = try_join_all(addrs.iter().map(|addr| UdpSocket::bind(*addr))).await?;

        Ok(Self { tcp, udp })
    }

    /// Bind one port chosen by the OS, with the same number for TCP and UDP.
    pub async fn bind_ephemeral(ip: IpAddr) -> io::Result<Self> {
        const ATTEMPTS: usize = 16;

        let mut last_err = io::Error::new(io::ErrorKind::AddrInUse, "no free port pair found");
        for _ in 0..ATTEMPTS {
            let tcp = TcpListener::bind(SocketAddr::new(ip, 0)).await?;
            let addr = tcp.local_addr()?;
            match UdpSocket::bind(addr).await {
                Ok(udp) => {
                    return Ok(Self {
                        tcp: vec![tcp],
                        udp: vec![udp],
                    })
                }
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }

    /// Ports this reflector answers on.
    pub fn ports(&self) -> Vec<Port> {
        self.tcp
            .iter()
            .filter_map(|l| l.local_addr().ok())
            .filter_map(|addr| Port::new(addr.port()))
            .collect()
    }

    /// Serve until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let mut tasks = JoinSet::new();

        for listener in self.tcp {
            tasks.spawn(serve_tcp(listener, cancel.clone()));
        }
        for socket in self.udp {
            tasks.spawn(serve_udp(socket, cancel.clone()));
        }
        info!(sockets = tasks.len(), "reflector running");

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "reflector task failed");
            }
        }
        info!("reflector stopped");
    }
}

async fn serve_tcp(listener: TcpListener, cancel: CancellationToken) {
    let local = listener.local_addr().ok();
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(?local, %peer, "tcp connection accepted");
                    connections.spawn(echo(stream, peer));
                }
                Err(e) => warn!(?local, error = %e, "tcp accept failed"),
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
    connections.abort_all();
}

async fn echo(mut stream: TcpStream, peer: SocketAddr) {
    let (mut reader, mut writer) = stream.split();
    match tokio::time::timeout(TCP_IDLE_TIMEOUT, tokio::io::copy(&mut reader, &mut writer)).await {
        Ok(Ok(bytes)) => trace!(%peer, bytes, "tcp echo finished"),
        Ok(Err(e)) => debug!(%peer, error = %e, "tcp echo failed"),
        Err(_) => debug!(%peer, "tcp echo idle timeout"),
    }
    let _ = writer.shutdown().await;
}

async fn serve_udp(socket: UdpSocket, cancel: CancellationToken) {
    let socket = Arc::new(socket);
    let local = socket.local_addr().ok();
    let mut buf = [0u8; 1500];

    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => break,
            received = socket.recv_from(&mut buf) => received,
        };
        let arrived = Instant::now();

        let (n, peer) = match received {
            Ok(received) => received,
            Err(e) => {
                // ICMP errors from earlier acks surface here; keep serving.
                trace!(?local, error = %e, "udp receive error");
                continue;
            }
        };

        let Some(request) = Request::decode(&buf[..n]) else {
            trace!(?local, %peer, bytes = n, "ignoring non-reachability datagram");
            continue;
        };

        let hold_ms = arrived.elapsed().as_millis() as u32;
        let ack = Ack::for_request(&request, hold_ms);
        if let Err(e) = socket.send_to(&ack.encode(), peer).await {
            debug!(?local, %peer, error = %e, "udp ack failed");
        } else {
            trace!(?local, %peer, packet_id = request.packet_id, "udp ack sent");
        }
    }
}
