//! End-to-end reachability runs against an in-process reflector.

use netreach::engine::{EngineConfig, NoopListener, ReachabilityEngine, ReachabilityReport};
use netreach::reflector::Reflector;
use netreach::{ProbeError, Protocol, Target};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn target() -> Target {
    Target::new("127.0.0.1", LOOPBACK)
}

/// A port number nothing is listening on.
async fn closed_port() -> u16 {
    let listener = TcpListener::bind((LOOPBACK, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

async fn start_reflector() -> (u16, CancellationToken) {
    let reflector = Reflector::bind_ephemeral(LOOPBACK).await.unwrap();
    let port = reflector.ports()[0].as_u16();
    let cancel = CancellationToken::new();
    tokio::spawn(reflector.run(cancel.clone()));
    (port, cancel)
}

async fn run(engine: &ReachabilityEngine, ports: &[u16]) -> ReachabilityReport {
    let handle = tokio_test::assert_ok!(engine.run_test(target(), ports, Arc::new(NoopListener)));
    let outcome = tokio_test::assert_ok!(handle.wait().await);
    outcome.into_report().expect("run completed")
}

fn config() -> EngineConfig {
    EngineConfig::default().with_timeout(Duration::from_millis(1500))
}

#[tokio::test]
async fn test_loopback_open_and_closed_ports() {
    let (open, cancel) = start_reflector().await;
    let closed = closed_port().await;

    let engine = ReachabilityEngine::new(config());
    let report = run(&engine, &[open, closed]).await;

    assert_eq!(report.ports, vec![open, closed]);
    assert_eq!(report.tcp_reachable, vec![true, false]);
    assert!(report.udp_reachable[0]);

    let acked = report.get(open, Protocol::Udp).unwrap();
    assert!(!acked.inferred, "reflector should answer, got {:?}", acked);

    let refused = report.get(closed, Protocol::Tcp).unwrap();
    assert!(matches!(
        refused.error,
        Some(ProbeError::ConnectionRefused) | Some(ProbeError::Timeout)
    ));

    cancel.cancel();
}

#[tokio::test]
async fn test_independent_engines_agree() {
    let (open, cancel) = start_reflector().await;
    let closed = closed_port().await;
    let ports = [open, closed];

    let first = ReachabilityEngine::new(config());
    let second = ReachabilityEngine::new(config());
    let (a, b) = tokio::join!(run(&first, &ports), run(&second, &ports));

    assert_eq!(a.ports, b.ports);
    assert_eq!(a.tcp_reachable, b.tcp_reachable);
    assert_eq!(a.udp_reachable, b.udp_reachable);
    assert_ne!(a.run_id, b.run_id);

    cancel.cancel();
}

#[tokio::test]
async fn test_tcp_echo_through_reflector() {
    let (open, cancel) = start_reflector().await;

    let engine = ReachabilityEngine::new(config().with_tcp_echo(true));
    let report = run(&engine, &[open]).await;

    let tcp = report.get(open, Protocol::Tcp).unwrap();
    assert!(tcp.reachable, "echo failed: {:?}", tcp);
    assert!(tcp.latency_ms.is_some());

    cancel.cancel();
}

#[tokio::test]
async fn test_engine_is_reusable_after_a_run() {
    let (open, cancel) = start_reflector().await;
    let engine = ReachabilityEngine::new(config());

    let first = run(&engine, &[open]).await;
    let second = run(&engine, &[open, open]).await;

    assert_eq!(first.tcp_reachable, second.tcp_reachable);
    assert_eq!(second.results.len(), 2);

    cancel.cancel();
}
