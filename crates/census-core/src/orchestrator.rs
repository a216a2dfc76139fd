//! Concurrent fan-out over compartments.
//!
//! One task per compartment, at most `max_concurrent_branches` walking at a
//! time. Every task shares the run's [`Invoker`] (one pacing gate) and
//! [`RunCache`]. Results are collected in dispatch order, so the report is
//! deterministic for a given compartment listing.

use std::sync::Arc;
use std::time::Instant;

use census_upstream::UpstreamApi;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{warn, Instrument};

use crate::cache::RunCache;
use crate::cancel::CancelSignal;
use crate::config::{CensusConfig, ReportProfile};
use crate::domain::{BackupRecord, MaintenanceRecord, ResourceNode, TimeWindow};
use crate::error::{BranchError, BranchFailure, CensusError, CensusResult};
use crate::invoker::{Invoker, StatsSnapshot};
use crate::obs;
use crate::sink::ReportBody;
use crate::walker::{BranchOutcome, Walker};

/// Branch counts for one run. `succeeded + errored + cancelled == total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub branches_total: usize,
    pub branches_succeeded: usize,
    /// Branches with at least one failed listing, or whose task died.
    pub branches_errored: usize,
    /// Branches skipped or cut short by cancellation.
    pub branches_cancelled: usize,
    pub records: usize,
}

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub profile: ReportProfile,
    pub window: TimeWindow,
    /// Filtered records, branch by branch in dispatch order.
    pub records: Vec<BackupRecord>,
    /// Scheduled maintenance runs, same ordering (maintenance profile only).
    pub maintenance_runs: Vec<MaintenanceRecord>,
    /// At most one per branch.
    pub branch_errors: Vec<BranchError>,
    pub summary: RunSummary,
    pub stats: StatsSnapshot,
    /// Cancellation was raised before the run finished.
    pub cancelled: bool,
}

impl RunReport {
    /// No branch errored and the run was not cancelled.
    pub fn is_complete(&self) -> bool {
        self.branch_errors.is_empty() && !self.cancelled
    }

    /// What the profile reports, ready for a sink.
    pub fn body(&self) -> ReportBody<'_> {
        match self.profile {
            ReportProfile::Maintenance => ReportBody::Maintenance(&self.maintenance_runs),
            ReportProfile::Oracle | ReportProfile::Mysql => ReportBody::Backups(&self.records),
        }
    }
}

/// Runs one enumeration over a root compartment.
pub struct Orchestrator {
    upstream: Arc<dyn UpstreamApi>,
    config: CensusConfig,
    window: TimeWindow,
    cancel: CancelSignal,
}

impl Orchestrator {
    /// Build an orchestrator; rejects invalid configuration up front.
    pub fn new(
        upstream: Arc<dyn UpstreamApi>,
        config: CensusConfig,
        window: TimeWindow,
    ) -> CensusResult<Self> {
        config.validate()?;
        Ok(Self {
            upstream,
            config,
            window,
            cancel: CancelSignal::never(),
        })
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &CensusConfig {
        &self.config
    }

    /// Enumerate every active compartment under `root` and collect its leaves.
    ///
    /// Only a failure to list the compartments themselves is fatal. Branch
    /// failures end up in [`RunReport::branch_errors`] next to the records
    /// that were still collected.
    pub async fn run(&self, root: &ResourceNode) -> CensusResult<RunReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = obs::run_span(&run_id, &root.id);
        self.run_inner(run_id, root).instrument(span).await
    }

    async fn run_inner(&self, run_id: String, root: &ResourceNode) -> CensusResult<RunReport> {
        let started = Instant::now();
        let profile = self.config.profile;
        obs::emit_run_started(&run_id, &root.id, profile.slug(), &self.window);

        let invoker = Arc::new(
            Invoker::new(self.config.invoker.clone()).with_cancel(self.cancel.clone()),
        );
        let walker = Walker::new(
            Arc::clone(&self.upstream),
            Arc::clone(&invoker),
            Arc::new(RunCache::new()),
            profile,
        );

        let mut branches = match walker.list_compartments(root).await {
            Ok(compartments) => compartments,
            Err(source) if source.is_cancelled() => {
                warn!("run cancelled before compartments were listed");
                Vec::new()
            }
            Err(source) => {
                invoker.stats().flush();
                let err = CensusError::EnumerationAborted {
                    root_id: root.id.clone(),
                    source,
                };
                obs::emit_run_aborted(&run_id, &err);
                return Err(err);
            }
        };
        let walk_root = self.config.include_root_compartment || profile.includes_root();
        if walk_root && !self.cancel.is_cancelled() {
            branches.push(root.clone());
        }

        let outcomes = self.fan_out(&walker, &branches).await;

        let mut records = Vec::new();
        let mut maintenance_runs = Vec::new();
        let mut branch_errors = Vec::new();
        let mut summary = RunSummary {
            branches_total: branches.len(),
            ..RunSummary::default()
        };
        for (compartment, joined) in branches.iter().zip(outcomes) {
            match joined {
                Ok(outcome) => {
                    records.extend(outcome.records);
                    maintenance_runs.extend(outcome.maintenance_runs);
                    if !outcome.failures.is_empty() {
                        summary.branches_errored += 1;
                        branch_errors.push(BranchError {
                            compartment_id: compartment.id.clone(),
                            compartment_name: compartment.name.clone(),
                            failure: BranchFailure::Walk(outcome.failures),
                        });
                    } else if outcome.cancelled {
                        summary.branches_cancelled += 1;
                    } else {
                        summary.branches_succeeded += 1;
                    }
                }
                Err(join_err) => {
                    warn!(compartment = %compartment.name, error = %join_err, "branch task died");
                    summary.branches_errored += 1;
                    branch_errors.push(BranchError {
                        compartment_id: compartment.id.clone(),
                        compartment_name: compartment.name.clone(),
                        failure: BranchFailure::Panicked(join_err.to_string()),
                    });
                }
            }
        }
        summary.records = records.len() + maintenance_runs.len();

        invoker.stats().flush();
        obs::emit_run_finished(&run_id, started.elapsed().as_millis() as u64, &summary);

        Ok(RunReport {
            run_id,
            profile,
            window: self.window,
            records,
            maintenance_runs,
            branch_errors,
            summary,
            stats: invoker.stats().snapshot(),
            cancelled: self.cancel.is_cancelled(),
        })
    }

    /// Spawn one task per branch behind a semaphore and await them in order.
    async fn fan_out(
        &self,
        walker: &Walker,
        branches: &[ResourceNode],
    ) -> Vec<Result<BranchOutcome, tokio::task::JoinError>> {
        let permits = self.config.max_concurrent_branches.min(branches.len());
        let sem = Arc::new(Semaphore::new(permits));
        let keep_all = self.config.keep_all_matches_per_leaf;

        let mut tasks = Vec::with_capacity(branches.len());
        for compartment in branches {
            let walker = walker.clone();
            let sem = Arc::clone(&sem);
            let cancel = self.cancel.clone();
            let compartment = compartment.clone();
            let window = self.window;

            let task = tokio::spawn(
                async move {
                    let _permit = sem.acquire_owned().await.ok();

                    // Queued branches are skipped once the run is cancelled.
                    if cancel.is_cancelled() {
                        return BranchOutcome {
                            cancelled: true,
                            ..BranchOutcome::default()
                        };
                    }

                    let outcome = walker.walk_branch(&compartment, &window, keep_all).await;
                    obs::emit_branch_finished(
                        &compartment.name,
                        outcome.record_count(),
                        outcome.failures.len(),
                        outcome.cancelled,
                    );
                    outcome
                }
                .in_current_span(),
            );
            tasks.push(task);
        }

        futures::future::join_all(tasks).await
    }
}
