//! Completion listener capability.

use crate::engine::run::ReachabilityReport;
use crate::probe::ProbeResult;
use crate::types::RunId;

/// Receives the outcome of a test run.
///
/// For every run exactly one of [`on_finished`](Self::on_finished) or
/// [`on_cancelled`](Self::on_cancelled) is called, from the engine's task.
/// Implementations should return quickly.
pub trait ResultListener: Send + Sync {
    /// All probes settled; `report` holds one TCP and one UDP result per port.
    fn on_finished(&self, report: &ReachabilityReport);

    /// The run was cancelled before completing. No report is produced.
    fn on_cancelled(&self, _run_id: RunId) {}

    /// One probe settled. Called in completion order, not port order.
    fn on_probe_settled(&self, _result: &ProbeResult) {}
}

impl<F> ResultListener for F
where
    F: Fn(&ReachabilityReport) + Send + Sync,
{
    fn on_finished(&self, report: &ReachabilityReport) {
        self(report)
    }
}

/// A listener that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl ResultListener for NoopListener {
    fn on_finished(&self, _report: &ReachabilityReport) {}
}
