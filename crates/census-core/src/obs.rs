//! Run lifecycle events.
//!
//! Events are emitted at `info!` with an `event` field (`run.started`,
//! `branch.finished`, `run.finished`, `report.delivered`) so they can be
//! picked out of JSON logs.

use tracing::{info, warn};

use crate::domain::TimeWindow;
use crate::orchestrator::RunSummary;

/// Span carrying `run_id` for everything a run logs, including its branch tasks.
///
/// Attach it with `Instrument::instrument` rather than entering it, since the
/// run future moves between threads.
pub fn run_span(run_id: &str, root_id: &str) -> tracing::Span {
    tracing::info_span!("census.run", run_id = %run_id, root_id = %root_id)
}

pub fn emit_run_started(run_id: &str, root_id: &str, profile: &str, window: &TimeWindow) {
    info!(
        event = "run.started",
        run_id = %run_id,
        root_id = %root_id,
        profile = %profile,
        window = %window,
    );
}

pub fn emit_branch_finished(
    compartment: &str,
    records: usize,
    failures: usize,
    cancelled: bool,
) {
    info!(
        event = "branch.finished",
        compartment = %compartment,
        records = records,
        failures = failures,
        cancelled = cancelled,
    );
}

pub fn emit_run_finished(run_id: &str, duration_ms: u64, summary: &RunSummary) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        branches_total = summary.branches_total,
        branches_succeeded = summary.branches_succeeded,
        branches_errored = summary.branches_errored,
        branches_cancelled = summary.branches_cancelled,
        records = summary.records,
    );
}

/// Compartment enumeration failed; nothing was walked.
pub fn emit_run_aborted(run_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "run.aborted", run_id = %run_id, error = %error);
}

pub fn emit_report_delivered(target: &str, records: usize, ok: bool) {
    if ok {
        info!(event = "report.delivered", target = %target, records = records);
    } else {
        warn!(event = "report.failed", target = %target, records = records);
    }
}
