//! Pacing and circuit-breaking as seen by the upstream during a whole run.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use census_core::{
    BranchFailure, CensusConfig, InvokeError, Orchestrator, ResourceNode, TimeWindow,
};
use census_upstream::fakes::{FailTarget, Fixture, FixtureUpstream};
use census_upstream::{
    Page, RawBackup, RawMaintenanceRun, RawResource, ResourceKind, UpstreamApi, UpstreamError,
    UpstreamResult,
};
use chrono::NaiveDate;
use tokio::time::Instant;

/// Delegates to a fixture and records when each call started.
struct ClockedUpstream {
    inner: FixtureUpstream,
    starts: Mutex<Vec<Instant>>,
}

impl ClockedUpstream {
    fn new(inner: FixtureUpstream) -> Self {
        Self {
            inner,
            starts: Mutex::new(Vec::new()),
        }
    }

    fn stamp(&self) {
        self.starts.lock().unwrap().push(Instant::now());
    }

    fn starts(&self) -> Vec<Instant> {
        self.starts.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpstreamApi for ClockedUpstream {
    async fn list_compartments(
        &self,
        root_id: &str,
        page: Option<&str>,
    ) -> UpstreamResult<Page<RawResource>> {
        self.stamp();
        self.inner.list_compartments(root_id, page).await
    }

    async fn list_child_resources(
        &self,
        kind: ResourceKind,
        parent_id: &str,
        compartment_id: &str,
        page: Option<&str>,
    ) -> UpstreamResult<Page<RawResource>> {
        self.stamp();
        self.inner
            .list_child_resources(kind, parent_id, compartment_id, page)
            .await
    }

    async fn list_leaf_records(
        &self,
        parent_id: &str,
        compartment_id: &str,
        page: Option<&str>,
    ) -> UpstreamResult<Page<RawBackup>> {
        self.stamp();
        self.inner
            .list_leaf_records(parent_id, compartment_id, page)
            .await
    }

    async fn list_maintenance_runs(
        &self,
        target_id: &str,
        compartment_id: &str,
        page: Option<&str>,
    ) -> UpstreamResult<Page<RawMaintenanceRun>> {
        self.stamp();
        self.inner
            .list_maintenance_runs(target_id, compartment_id, page)
            .await
    }
}

fn window() -> TimeWindow {
    TimeWindow::utc_day(NaiveDate::from_ymd_opt(2026, 10, 18).unwrap())
}

fn homes(n: usize) -> Fixture {
    let mut fixture = Fixture::new();
    for i in 1..=n {
        let c = format!("c{i}");
        fixture = fixture
            .compartment(&c, &format!("compartment-{i}"))
            .db_home(&c, &format!("h{i}"), &format!("home-{i}"))
            .database(&format!("h{i}"), &c, &format!("d{i}"), &format!("DB{i}"));
    }
    fixture
}

#[tokio::test(start_paused = true)]
async fn test_call_starts_are_spaced_across_all_branches() {
    let upstream = Arc::new(ClockedUpstream::new(
        FixtureUpstream::new(homes(4)).with_latency(Duration::from_millis(50)),
    ));
    let mut config = CensusConfig::default();
    config.invoker.min_request_interval_ms = 200;
    config.max_concurrent_branches = 4;

    let report = Orchestrator::new(upstream.clone(), config, window())
        .unwrap()
        .run(&ResourceNode::root("tenancy", "acme"))
        .await
        .unwrap();
    assert_eq!(report.summary.branches_succeeded, 4);

    let mut starts = upstream.starts();
    starts.sort();
    // compartments + (home, database, backups) per branch
    assert_eq!(starts.len(), 1 + 4 * 3);
    for pair in starts.windows(2) {
        assert!(
            pair[1] - pair[0] >= Duration::from_millis(200),
            "call starts closer than the pacing interval"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_open_circuit_stops_upstream_calls() {
    let mut fixture_upstream = FixtureUpstream::new(homes(3));
    for c in ["c1", "c2", "c3"] {
        fixture_upstream = fixture_upstream.fail(
            FailTarget::Children {
                kind: ResourceKind::DbHome,
                parent_id: c.to_string(),
            },
            UpstreamError::server_error("service unavailable"),
            None,
        );
    }
    let upstream = Arc::new(fixture_upstream);
    let mut config = CensusConfig::default();
    config.invoker.min_request_interval_ms = 0;
    config.max_concurrent_branches = 1;

    let report = Orchestrator::new(upstream.clone(), config, window())
        .unwrap()
        .run(&ResourceNode::root("tenancy", "acme"))
        .await
        .unwrap();

    // 4 attempts for branch 1, then the 5th failure (branch 2) opens the circuit.
    assert_eq!(upstream.call_count(), 1 + 5);
    assert_eq!(report.branch_errors.len(), 3);
    assert_eq!(report.stats.circuit_trips, 1);

    let last_error = |i: usize| match &report.branch_errors[i].failure {
        BranchFailure::Walk(failures) => failures[0].error.clone(),
        other => panic!("expected walk failure, got {other:?}"),
    };
    assert!(matches!(last_error(0), InvokeError::ServerErrorExhausted { .. }));
    assert!(matches!(last_error(1), InvokeError::CircuitOpen { .. }));
    assert!(matches!(last_error(2), InvokeError::CircuitOpen { .. }));
}
