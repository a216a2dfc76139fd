//! In-memory upstream for tests and offline runs
//!
//! `FixtureUpstream` serves a [`Fixture`] tree with optional pagination,
//! artificial latency and scripted failures. It also records how it was
//! called so tests can assert on call counts and observed concurrency.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::api::{Page, RawBackup, RawMaintenanceRun, RawResource, ResourceKind, UpstreamApi};
use crate::error::{StatusClass, UpstreamError};
use crate::UpstreamResult;

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

/// A child resource attached to a parent node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureResource {
    pub kind: ResourceKind,
    pub parent_id: String,
    #[serde(flatten)]
    pub resource: RawResource,
}

/// A backup attached to a database or db system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureBackup {
    pub parent_id: String,
    #[serde(flatten)]
    pub backup: RawBackup,
}

/// A maintenance run attached to the infrastructure it targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureMaintenanceRun {
    pub target_id: String,
    #[serde(flatten)]
    pub run: RawMaintenanceRun,
}

/// Static snapshot of a resource tree, in upstream order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Fixture {
    pub compartments: Vec<RawResource>,
    pub resources: Vec<FixtureResource>,
    pub backups: Vec<FixtureBackup>,
    pub maintenance_runs: Vec<FixtureMaintenanceRun>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a fixture from a JSON file.
    pub fn from_json_file(path: &Path) -> UpstreamResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            UpstreamError::new(
                StatusClass::ClientError,
                format!("read fixture {}: {e}", path.display()),
            )
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Add an `ACTIVE` compartment.
    pub fn compartment(self, id: &str, name: &str) -> Self {
        self.compartment_in_state(id, name, "ACTIVE")
    }

    pub fn compartment_in_state(mut self, id: &str, name: &str, state: &str) -> Self {
        self.compartments
            .push(RawResource::new(id, name, id, state));
        self
    }

    /// Add an arbitrary child resource.
    pub fn resource(mut self, kind: ResourceKind, parent_id: &str, resource: RawResource) -> Self {
        self.resources.push(FixtureResource {
            kind,
            parent_id: parent_id.to_string(),
            resource,
        });
        self
    }

    /// Add an `AVAILABLE` db home under a compartment.
    pub fn db_home(self, compartment_id: &str, id: &str, name: &str) -> Self {
        self.resource(
            ResourceKind::DbHome,
            compartment_id,
            RawResource::new(id, name, compartment_id, "AVAILABLE"),
        )
    }

    /// Add an `AVAILABLE` database under a db home.
    pub fn database(self, db_home_id: &str, compartment_id: &str, id: &str, name: &str) -> Self {
        self.resource(
            ResourceKind::Database,
            db_home_id,
            RawResource::new(id, name, compartment_id, "AVAILABLE"),
        )
    }

    /// Add an `ACTIVE` MySQL db system under a compartment.
    pub fn db_system(self, compartment_id: &str, id: &str, name: &str) -> Self {
        self.resource(
            ResourceKind::DbSystem,
            compartment_id,
            RawResource::new(id, name, compartment_id, "ACTIVE"),
        )
    }

    /// Add a backup under a database or db system.
    pub fn backup(mut self, parent_id: &str, backup: RawBackup) -> Self {
        self.backups.push(FixtureBackup {
            parent_id: parent_id.to_string(),
            backup,
        });
        self
    }

    /// Add an `AVAILABLE` Exadata infrastructure under a compartment.
    pub fn exadata(self, compartment_id: &str, id: &str, name: &str) -> Self {
        self.resource(
            ResourceKind::ExadataInfrastructure,
            compartment_id,
            RawResource::new(id, name, compartment_id, "AVAILABLE"),
        )
    }

    /// Add a maintenance run targeting an Exadata infrastructure.
    pub fn maintenance_run(mut self, target_id: &str, run: RawMaintenanceRun) -> Self {
        self.maintenance_runs.push(FixtureMaintenanceRun {
            target_id: target_id.to_string(),
            run,
        });
        self
    }
}

// ---------------------------------------------------------------------------
// Scripted failures
// ---------------------------------------------------------------------------

/// Which listing a scripted failure applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailTarget {
    Compartments,
    Children { kind: ResourceKind, parent_id: String },
    Leaf { parent_id: String },
    MaintenanceRuns { target_id: String },
}

#[derive(Debug)]
struct FailureRule {
    target: FailTarget,
    error: UpstreamError,
    /// `None` fails forever
    remaining: Option<u32>,
}

// ---------------------------------------------------------------------------
// FixtureUpstream
// ---------------------------------------------------------------------------

/// In-memory [`UpstreamApi`] backed by a [`Fixture`].
#[derive(Debug)]
pub struct FixtureUpstream {
    fixture: Fixture,
    page_size: Option<usize>,
    latency: Option<Duration>,
    failures: Mutex<Vec<FailureRule>>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FixtureUpstream {
    pub fn new(fixture: Fixture) -> Self {
        Self {
            fixture,
            page_size: None,
            latency: None,
            failures: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Split every listing into pages of at most `size` items.
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size.max(1));
        self
    }

    /// Hold every call open for `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail calls hitting `target`; `times = None` fails forever.
    pub fn fail(self, target: FailTarget, error: UpstreamError, times: Option<u32>) -> Self {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(FailureRule {
                target,
                error,
                remaining: times,
            });
        self
    }

    /// Total number of calls received, including failed ones.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Call log in arrival order, e.g. `children:db_home:c1:page=-`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Highest number of calls observed in progress at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, label: String, target: FailTarget) -> UpstreamResult<()> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(label);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(rule) = failures
            .iter_mut()
            .find(|r| r.target == target && r.remaining != Some(0))
        {
            if let Some(n) = rule.remaining.as_mut() {
                *n -= 1;
            }
            return Err(rule.error.clone());
        }
        Ok(())
    }

    fn paginate<T: Clone>(&self, items: Vec<T>, page: Option<&str>) -> UpstreamResult<Page<T>> {
        let Some(size) = self.page_size else {
            return Ok(Page::last(items));
        };
        let offset = match page {
            None => 0,
            Some(token) => token.parse::<usize>().map_err(|_| {
                UpstreamError::client_error(format!("invalid page token: {token}"))
            })?,
        };
        let end = (offset + size).min(items.len());
        let next_page = (end < items.len()).then(|| end.to_string());
        Ok(Page {
            items: items.get(offset..end).map(<[T]>::to_vec).unwrap_or_default(),
            next_page,
        })
    }
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl UpstreamApi for FixtureUpstream {
    async fn list_compartments(
        &self,
        root_id: &str,
        page: Option<&str>,
    ) -> UpstreamResult<Page<RawResource>> {
        self.enter(
            format!("compartments:{root_id}:page={}", page.unwrap_or("-")),
            FailTarget::Compartments,
        )
        .await?;
        self.paginate(self.fixture.compartments.clone(), page)
    }

    async fn list_child_resources(
        &self,
        kind: ResourceKind,
        parent_id: &str,
        _compartment_id: &str,
        page: Option<&str>,
    ) -> UpstreamResult<Page<RawResource>> {
        self.enter(
            format!("children:{kind}:{parent_id}:page={}", page.unwrap_or("-")),
            FailTarget::Children {
                kind,
                parent_id: parent_id.to_string(),
            },
        )
        .await?;
        let items = self
            .fixture
            .resources
            .iter()
            .filter(|r| r.kind == kind && r.parent_id == parent_id)
            .map(|r| r.resource.clone())
            .collect();
        self.paginate(items, page)
    }

    async fn list_leaf_records(
        &self,
        parent_id: &str,
        _compartment_id: &str,
        page: Option<&str>,
    ) -> UpstreamResult<Page<RawBackup>> {
        self.enter(
            format!("backups:{parent_id}:page={}", page.unwrap_or("-")),
            FailTarget::Leaf {
                parent_id: parent_id.to_string(),
            },
        )
        .await?;
        let items = self
            .fixture
            .backups
            .iter()
            .filter(|b| b.parent_id == parent_id)
            .map(|b| b.backup.clone())
            .collect();
        self.paginate(items, page)
    }

    async fn list_maintenance_runs(
        &self,
        target_id: &str,
        _compartment_id: &str,
        page: Option<&str>,
    ) -> UpstreamResult<Page<RawMaintenanceRun>> {
        self.enter(
            format!("maintenance:{target_id}:page={}", page.unwrap_or("-")),
            FailTarget::MaintenanceRuns {
                target_id: target_id.to_string(),
            },
        )
        .await?;
        let items = self
            .fixture
            .maintenance_runs
            .iter()
            .filter(|m| m.target_id == target_id)
            .map(|m| m.run.clone())
            .collect();
        self.paginate(items, page)
    }
}
