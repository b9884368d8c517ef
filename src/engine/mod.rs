//! Reachability engine - coordinates TCP and UDP probes across a port list.
//!
//! A run fans out one TCP and one UDP probe per port onto the tokio runtime,
//! bounded by a semaphore, then fans back in through a single collector
//! loop. The caller gets a [`RunHandle`] immediately; the listener hears
//! about the outcome exactly once.

mod config;
mod listener;
mod rate_limiter;
mod run;

pub use config::{EngineConfig, DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT};
pub use listener::{NoopListener, ResultListener};
pub use rate_limiter::RateLimiter;
pub use run::{ReachabilityReport, RunError, RunState, TestRun};

use crate::error::{EngineError, EngineResult, ProbeError};
use crate::probe::{Probe, ProbeResult, SharedProbe, TcpProbe, UdpProbe};
use crate::types::{Port, PortList, RunId, Target};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// How a run ended.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(ReachabilityReport),
    Cancelled(RunId),
}

impl RunOutcome {
    /// The report, if the run completed.
    pub fn into_report(self) -> Option<ReachabilityReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Cancelled(_) => None,
        }
    }
}

/// Handle to a run in flight.
#[derive(Debug)]
pub struct RunHandle {
    id: RunId,
    cancel: CancellationToken,
    task: JoinHandle<EngineResult<RunOutcome>>,
}

impl RunHandle {
    pub fn id(&self) -> RunId {
        self.id
    }

    /// Request cancellation. In-flight probes are aborted and their
    /// sockets released; a probe that already settled is discarded.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run to end.
    pub async fn wait(self) -> EngineResult<RunOutcome> {
        self.task
            .await
            .map_err(|e| EngineError::RunFailed(e.to_string()))?
    }
}

struct ActiveRun {
    id: RunId,
    cancel: CancellationToken,
}

type ActiveSlot = Arc<Mutex<Option<ActiveRun>>>;

/// Frees the engine's busy slot, including when the run task panics.
struct ActiveGuard {
    slot: ActiveSlot,
    id: RunId,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|active| active.id == self.id) {
            *slot = None;
        }
    }
}

/// Runs reachability tests, one at a time.
///
/// # Example
///
/// ```rust,ignore
/// use netreach::engine::{EngineConfig, ReachabilityEngine};
/// use netreach::types::Target;
/// use std::sync::Arc;
///
/// let engine = ReachabilityEngine::new(EngineConfig::default());
/// let target = Target::resolve("localhost").await?;
/// let handle = engine.run_test(target, &[80, 443], Arc::new(|report: &_| {
///     println!("{:?}", report);
/// }))?;
/// handle.wait().await?;
/// ```
pub struct ReachabilityEngine {
    config: EngineConfig,
    tcp: SharedProbe,
    udp: SharedProbe,
    active: ActiveSlot,
}

impl ReachabilityEngine {
    /// Create an engine using the socket-backed probes.
    pub fn new(config: EngineConfig) -> Self {
        let tcp = TcpProbe::new().with_echo(config.tcp_echo);
        let udp = UdpProbe::new()
            .with_policy(config.udp_policy)
            .with_retransmit(config.udp_retransmit_interval, config.udp_max_retransmissions);
        Self::with_probes(config, Arc::new(tcp), Arc::new(udp))
    }

    /// Create an engine with custom probe implementations.
    pub fn with_probes(config: EngineConfig, tcp: SharedProbe, udp: SharedProbe) -> Self {
        Self {
            config,
            tcp,
            udp,
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Whether a run is in progress.
    pub fn is_busy(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Cancel the run in progress. Returns false when idle.
    pub fn cancel(&self) -> bool {
        let slot = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(active) => {
                info!(run_id = %active.id.short(), "cancelling reachability test");
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Start a reachability test and return without waiting for it.
    ///
    /// Ports are validated and deduplicated (first occurrence wins). Fails
    /// with [`EngineError::Busy`] while another run is active and with
    /// [`EngineError::InvalidConfiguration`] for an empty target, an empty
    /// port list or an out-of-range port.
    ///
    /// Must be called from within a tokio runtime.
    pub fn run_test(
        &self,
        target: Target,
        ports: &[u16],
        listener: Arc<dyn ResultListener>,
    ) -> EngineResult<RunHandle> {
        self.config.validate()?;
        if target.host.trim().is_empty() {
            return Err(EngineError::InvalidConfiguration("empty target".into()));
        }
        let ports = PortList::from_raw(ports.iter().copied())?;

        let mut run = TestRun::new(target, ports);
        let cancel = CancellationToken::new();
        {
            let mut slot = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_some() {
                return Err(EngineError::Busy);
            }
            run.start()
                .map_err(|e| EngineError::RunFailed(e.to_string()))?;
            *slot = Some(ActiveRun {
                id: run.id(),
                cancel: cancel.clone(),
            });
        }

        let id = run.id();
        let guard = ActiveGuard {
            slot: Arc::clone(&self.active),
            id,
        };
        let context = RunContext {
            config: self.config.clone(),
            tcp: Arc::clone(&self.tcp),
            udp: Arc::clone(&self.udp),
            cancel: cancel.clone(),
            listener,
        };

        let task = tokio::spawn(execute(run, context, guard));
        Ok(RunHandle { id, cancel, task })
    }
}

struct RunContext {
    config: EngineConfig,
    tcp: SharedProbe,
    udp: SharedProbe,
    cancel: CancellationToken,
    listener: Arc<dyn ResultListener>,
}

async fn execute(
    mut run: TestRun,
    ctx: RunContext,
    guard: ActiveGuard,
) -> EngineResult<RunOutcome> {
    let run_id = run.id();
    info!(
        run_id = %run_id.short(),
        target = %run.target(),
        ports = run.ports().len(),
        "starting reachability test"
    );

    let semaphore = Arc::new(Semaphore::new(ctx.config.concurrency));
    let limiter = RateLimiter::new(ctx.config.rate_limit);
    let target = Arc::new(run.target().clone());

    let mut probes = JoinSet::new();
    for port in run.ports().iter() {
        for probe in [&ctx.tcp, &ctx.udp] {
            probes.spawn(launch(
                Arc::clone(probe),
                Arc::clone(&target),
                port,
                ctx.config.timeout,
                Arc::clone(&semaphore),
                limiter.clone(),
            ));
        }
    }

    let run_timer = async {
        match ctx.config.run_timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(run_timer);

    let mut timed_out = false;
    loop {
        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                probes.abort_all();
                while probes.join_next().await.is_some() {}
                run.cancel().map_err(|e| EngineError::RunFailed(e.to_string()))?;
                info!(
                    run_id = %run_id.short(),
                    settled = run.recorded(),
                    "reachability test cancelled"
                );
                drop(guard);
                ctx.listener.on_cancelled(run_id);
                return Ok(RunOutcome::Cancelled(run_id));
            }
            _ = &mut run_timer => {
                timed_out = true;
                warn!(
                    run_id = %run_id.short(),
                    pending = run.expected() - run.recorded(),
                    "run timeout reached, abandoning remaining probes"
                );
                probes.abort_all();
                while let Some(joined) = probes.join_next().await {
                    if let Ok(result) = joined {
                        settle(&mut run, &ctx, result);
                    }
                }
                break;
            }
            joined = probes.join_next() => match joined {
                Some(Ok(result)) => settle(&mut run, &ctx, result),
                Some(Err(e)) => warn!(run_id = %run_id.short(), error = %e, "probe task failed"),
                None => break,
            },
        }
    }

    let filler = if timed_out {
        ProbeError::Timeout
    } else {
        ProbeError::Io("probe task failed".into())
    };
    let filled = run
        .fill_missing(filler)
        .map_err(|e| EngineError::RunFailed(e.to_string()))?;
    if filled > 0 {
        debug!(run_id = %run_id.short(), filled, "recorded results for unsettled probes");
    }

    let report = run
        .complete()
        .map_err(|e| EngineError::RunFailed(e.to_string()))?;
    info!(
        run_id = %run_id.short(),
        tcp_reachable = report.reachable_count(crate::probe::Protocol::Tcp),
        udp_reachable = report.reachable_count(crate::probe::Protocol::Udp),
        duration_ms = report.duration_ms,
        "reachability test completed"
    );

    drop(guard);
    ctx.listener.on_finished(&report);
    Ok(RunOutcome::Completed(report))
}

fn settle(run: &mut TestRun, ctx: &RunContext, result: ProbeResult) {
    debug!(
        port = %result.port,
        protocol = %result.protocol,
        reachable = result.reachable,
        "probe settled"
    );
    ctx.listener.on_probe_settled(&result);
    if let Err(e) = run.record(result) {
        warn!(error = %e, "discarding probe result");
    }
}

/// One probe task: wait for a slot, then run with its own timeout.
async fn launch(
    probe: SharedProbe,
    target: Arc<Target>,
    port: Port,
    timeout: Duration,
    semaphore: Arc<Semaphore>,
    limiter: Option<RateLimiter>,
) -> ProbeResult {
    // The semaphore is never closed, so acquisition only fails on shutdown.
    let _permit = semaphore.acquire_owned().await.ok();
    if let Some(limiter) = &limiter {
        limiter.wait().await;
    }
    trace!(%port, protocol = %probe.protocol(), "probe launched");
    probe.probe(&target, port, timeout).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::Protocol;
    use async_trait::async_trait;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    /// Answers after a per-port delay; odd ports are reachable.
    struct SleepyProbe {
        protocol: Protocol,
        delay: fn(u16) -> Duration,
    }

    #[async_trait]
    impl Probe for SleepyProbe {
        fn protocol(&self) -> Protocol {
            self.protocol
        }

        async fn probe(&self, _target: &Target, port: Port, timeout: Duration) -> ProbeResult {
            let delay = (self.delay)(port.as_u16());
            if delay > timeout {
                tokio::time::sleep(timeout).await;
                return ProbeResult::unreachable(port, self.protocol, ProbeError::Timeout);
            }
            tokio::time::sleep(delay).await;
            if port.as_u16() % 2 == 1 {
                ProbeResult::reachable(port, self.protocol)
            } else {
                ProbeResult::unreachable(port, self.protocol, ProbeError::ConnectionRefused)
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        finished: AtomicUsize,
        cancelled: AtomicUsize,
        settled: AtomicUsize,
    }

    impl ResultListener for Recorder {
        fn on_finished(&self, _report: &ReachabilityReport) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }

        fn on_cancelled(&self, _run_id: RunId) {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
        }

        fn on_probe_settled(&self, _result: &ProbeResult) {
            self.settled.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn engine(config: EngineConfig, delay: fn(u16) -> Duration) -> ReachabilityEngine {
        ReachabilityEngine::with_probes(
            config,
            Arc::new(SleepyProbe {
                protocol: Protocol::Tcp,
                delay,
            }),
            Arc::new(SleepyProbe {
                protocol: Protocol::Udp,
                delay,
            }),
        )
    }

    fn target() -> Target {
        Target::new("127.0.0.1", IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    #[tokio::test]
    async fn test_one_result_per_port_and_protocol() {
        let recorder = Arc::new(Recorder::default());
        let engine = engine(EngineConfig::default(), |_| Duration::from_millis(5));

        let handle = engine
            .run_test(target(), &[1, 2, 3, 2, 1], recorder.clone())
            .unwrap();
        let report = handle.wait().await.unwrap().into_report().unwrap();

        assert_eq!(report.ports, vec![1, 2, 3]);
        assert_eq!(report.results.len(), 6);
        for port in [1, 2, 3] {
            for protocol in Protocol::ALL {
                let matching = report
                    .results
                    .iter()
                    .filter(|r| r.port.as_u16() == port && r.protocol == protocol)
                    .count();
                assert_eq!(matching, 1);
            }
        }
        assert_eq!(recorder.finished.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.settled.load(Ordering::SeqCst), 6);
        assert_eq!(recorder.cancelled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_output_order_ignores_completion_order() {
        // Earlier ports answer last.
        let engine = engine(EngineConfig::default(), |port| {
            Duration::from_millis(200 - u64::from(port) * 40)
        });

        let report = engine
            .run_test(target(), &[1, 2, 3, 4], Arc::new(NoopListener))
            .unwrap()
            .wait()
            .await
            .unwrap()
            .into_report()
            .unwrap();

        assert_eq!(report.ports, vec![1, 2, 3, 4]);
        assert_eq!(report.tcp_reachable, vec![true, false, true, false]);
        assert_eq!(report.udp_reachable, vec![true, false, true, false]);
    }

    #[tokio::test]
    async fn test_wall_time_tracks_slowest_probe() {
        let engine = engine(EngineConfig::default(), |_| Duration::from_millis(200));
        let ports: Vec<u16> = (1..=25).collect();

        let start = Instant::now();
        let outcome = engine
            .run_test(target(), &ports, Arc::new(NoopListener))
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::Completed(_)));
        // Sequential execution would take 50 x 200ms.
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_concurrency_cap_serializes_probes() {
        let config = EngineConfig::default().with_concurrency(1);
        let engine = engine(config, |_| Duration::from_millis(50));

        let start = Instant::now();
        engine
            .run_test(target(), &[1, 2], Arc::new(NoopListener))
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_busy_engine_rejects_second_run() {
        let engine = engine(EngineConfig::default(), |_| Duration::from_millis(300));

        let first = engine
            .run_test(target(), &[1, 2], Arc::new(NoopListener))
            .unwrap();
        assert!(engine.is_busy());

        let second = engine.run_test(target(), &[3], Arc::new(NoopListener));
        assert!(matches!(second, Err(EngineError::Busy)));

        let report = first.wait().await.unwrap().into_report().unwrap();
        assert_eq!(report.ports, vec![1, 2]);
        assert_eq!(report.results.len(), 4);

        assert!(!engine.is_busy());
        assert!(engine
            .run_test(target(), &[3], Arc::new(NoopListener))
            .is_ok());
    }

    #[tokio::test]
    async fn test_cancel_skips_on_finished() {
        let recorder = Arc::new(Recorder::default());
        let engine = engine(EngineConfig::default(), |_| Duration::from_secs(10));

        let handle = engine.run_test(target(), &[1, 2, 3], recorder.clone()).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(engine.cancel());

        let start = Instant::now();
        let outcome = handle.wait().await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(matches!(outcome, RunOutcome::Cancelled(_)));
        assert_eq!(recorder.finished.load(Ordering::SeqCst), 0);
        assert_eq!(recorder.cancelled.load(Ordering::SeqCst), 1);
        assert!(!engine.is_busy());
        assert!(!engine.cancel());
    }

    #[tokio::test]
    async fn test_run_timeout_completes_with_stragglers_timed_out() {
        let config = EngineConfig::default().with_run_timeout(Some(Duration::from_millis(200)));
        let engine = engine(config, |port| {
            if port == 2 {
                Duration::from_secs(2)
            } else {
                Duration::from_millis(10)
            }
        });

        let start = Instant::now();
        let report = engine
            .run_test(target(), &[1, 2], Arc::new(NoopListener))
            .unwrap()
            .wait()
            .await
            .unwrap()
            .into_report()
            .unwrap();

        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(report.tcp_reachable, vec![true, false]);
        assert_eq!(
            report.get(2, Protocol::Udp).and_then(|r| r.error.clone()),
            Some(ProbeError::Timeout)
        );
    }

    #[tokio::test]
    async fn test_invalid_configuration() {
        let engine = engine(EngineConfig::default(), |_| Duration::ZERO);

        let empty = engine.run_test(target(), &[], Arc::new(NoopListener));
        assert!(matches!(empty, Err(EngineError::InvalidConfiguration(_))));

        let zero = engine.run_test(target(), &[80, 0], Arc::new(NoopListener));
        assert!(matches!(zero, Err(EngineError::InvalidConfiguration(_))));

        let oversized = ReachabilityEngine::with_probes(
            EngineConfig::default().with_concurrency(usize::MAX),
            Arc::new(SleepyProbe {
                protocol: Protocol::Tcp,
                delay: |_| Duration::ZERO,
            }),
            Arc::new(SleepyProbe {
                protocol: Protocol::Udp,
                delay: |_| Duration::ZERO,
            }),
        );
        let huge = oversized.run_test(target(), &[80], Arc::new(NoopListener));
        assert!(matches!(huge, Err(EngineError::InvalidConfiguration(_))));
        assert!(!oversized.is_busy());

        let blank = Target::new("", IpAddr::V4(Ipv4Addr::LOCALHOST));
        let no_host = engine.run_test(blank, &[80], Arc::new(NoopListener));
        assert!(matches!(no_host, Err(EngineError::InvalidConfiguration(_))));

        assert!(!engine.is_busy());
    }

    /// Panics on port 2, answers immediately otherwise.
    struct PanickingProbe {
        protocol: Protocol,
    }

    #[async_trait]
    impl Probe for PanickingProbe {
        fn protocol(&self) -> Protocol {
            self.protocol
        }

        async fn probe(&self, _target: &Target, port: Port, _timeout: Duration) -> ProbeResult {
            if port.as_u16() == 2 {
                panic!("probe exploded on port 2");
            }
            ProbeResult::reachable(port, self.protocol)
        }
    }

    #[tokio::test]
    async fn test_panicked_task_still_fills_its_slot() {
        let recorder = Arc::new(Recorder::default());
        let engine = ReachabilityEngine::with_probes(
            EngineConfig::default(),
            Arc::new(PanickingProbe {
                protocol: Protocol::Tcp,
            }),
            Arc::new(PanickingProbe {
                protocol: Protocol::Udp,
            }),
        );

        let report = engine
            .run_test(target(), &[1, 2, 3], recorder.clone())
            .unwrap()
            .wait()
            .await
            .unwrap()
            .into_report()
            .unwrap();

        assert_eq!(report.results.len(), 6);
        assert_eq!(report.tcp_reachable, vec![true, false, true]);
        assert_eq!(report.udp_reachable, vec![true, false, true]);
        for protocol in Protocol::ALL {
            let failed = report.get(2, protocol).unwrap();
            assert!(matches!(failed.error, Some(ProbeError::Io(_))));
        }
        assert_eq!(recorder.finished.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.cancelled.load(Ordering::SeqCst), 0);
        assert!(!engine.is_busy());
    }

    #[tokio::test]
    async fn test_closure_listener_receives_report() {
        let (tx, rx) = std::sync::mpsc::channel();
        let tx = Mutex::new(tx);
        let engine = engine(EngineConfig::default(), |_| Duration::from_millis(1));

        let listener = move |report: &ReachabilityReport| {
            let _ = tx.lock().unwrap().send(report.ports.clone());
        };
        engine
            .run_test(target(), &[7], Arc::new(listener))
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(rx.try_recv().unwrap(), vec![7]);
    }
}
