//! Hierarchy walker.
//!
//! Lists one level of the resource tree at a time, through the run's
//! [`Invoker`] and [`RunCache`]. A branch walk is depth-first and sequential:
//! db homes in upstream order, their databases in order, then each
//! database's backups in order (MySQL: db systems, then their backups;
//! maintenance: Exadata infrastructures, then the runs targeting each).

use std::future::Future;
use std::sync::Arc;

use census_upstream::{Page, RawResource, ResourceKind, UpstreamApi, UpstreamResult};
use tracing::{debug, warn};

use crate::cache::{ChildKey, RunCache};
use crate::config::ReportProfile;
use crate::domain::{BackupRecord, MaintenanceRecord, ResourceNode, TimeWindow};
use crate::error::{InvokeError, InvokeResult, WalkFailure};
use crate::filter::{filter, scheduled_in};
use crate::invoker::Invoker;

/// What one branch walk produced.
#[derive(Debug, Default)]
pub struct BranchOutcome {
    /// Window-filtered records, in traversal order.
    pub records: Vec<BackupRecord>,
    /// Scheduled maintenance runs in the window (maintenance profile only).
    pub maintenance_runs: Vec<MaintenanceRecord>,
    /// Listings that failed; the walk continued past each of them.
    pub failures: Vec<WalkFailure>,
    /// The run was cancelled before the walk finished.
    pub cancelled: bool,
}

/// Walks the hierarchy for one run. Cheap to clone into branch tasks.
#[derive(Clone)]
pub struct Walker {
    upstream: Arc<dyn UpstreamApi>,
    invoker: Arc<Invoker>,
    cache: Arc<RunCache>,
    profile: ReportProfile,
}

impl Walker {
    pub fn new(
        upstream: Arc<dyn UpstreamApi>,
        invoker: Arc<Invoker>,
        cache: Arc<RunCache>,
        profile: ReportProfile,
    ) -> Self {
        Self {
            upstream,
            invoker,
            cache,
            profile,
        }
    }

    pub fn profile(&self) -> ReportProfile {
        self.profile
    }

    /// Active compartments under `root`, in upstream order.
    pub async fn list_compartments(&self, root: &ResourceNode) -> InvokeResult<Vec<ResourceNode>> {
        let key = ChildKey::new(&root.id, ResourceKind::Compartment);
        if let Some(hit) = self.cache.children(&key) {
            return Ok(hit);
        }

        let upstream = self.upstream.as_ref();
        let root_id = root.id.as_str();
        let raw = self
            .drain("list compartments", move |page| async move {
                upstream.list_compartments(root_id, page.as_deref()).await
            })
            .await?;

        let nodes = keep_active(ResourceKind::Compartment, root_id, raw);
        debug!(root = %root.id, compartments = nodes.len(), "listed compartments");
        self.cache.put_children(key, nodes.clone());
        Ok(nodes)
    }

    /// Active children of `kind` under `parent`, in upstream order.
    pub async fn list_children(
        &self,
        parent: &ResourceNode,
        kind: ResourceKind,
    ) -> InvokeResult<Vec<ResourceNode>> {
        let key = ChildKey::new(&parent.id, kind);
        if let Some(hit) = self.cache.children(&key) {
            debug!(parent = %parent.id, %kind, "child listing served from cache");
            return Ok(hit);
        }

        let upstream = self.upstream.as_ref();
        let parent_id = parent.id.as_str();
        let compartment_id = parent.compartment_id.as_str();
        let operation = format!("list {kind}");
        let raw = self
            .drain(&operation, move |page| async move {
                upstream
                    .list_child_resources(kind, parent_id, compartment_id, page.as_deref())
                    .await
            })
            .await?;

        let nodes = keep_active(kind, parent_id, raw);
        debug!(parent = %parent.id, %kind, children = nodes.len(), "listed children");
        self.cache.put_children(key, nodes.clone());
        Ok(nodes)
    }

    /// Every backup of `parent` (a database or db system), unfiltered.
    ///
    /// Records are reported under `compartment_name` even on a cache hit.
    pub async fn list_backups(
        &self,
        parent: &ResourceNode,
        compartment_name: &str,
    ) -> InvokeResult<Vec<BackupRecord>> {
        let raw = match self.cache.backups(&parent.id) {
            Some(hit) => {
                debug!(parent = %parent.id, "backup listing served from cache");
                hit
            }
            None => {
                let upstream = self.upstream.as_ref();
                let parent_id = parent.id.as_str();
                let compartment_id = parent.compartment_id.as_str();
                let raw = self
                    .drain("list backups", move |page| async move {
                        upstream
                            .list_leaf_records(parent_id, compartment_id, page.as_deref())
                            .await
                    })
                    .await?;
                debug!(parent = %parent.id, backups = raw.len(), "listed backups");
                self.cache.put_backups(&parent.id, raw.clone());
                raw
            }
        };

        let created_is_completion = self.profile.created_is_completion();
        Ok(raw
            .into_iter()
            .map(|b| BackupRecord::from_raw(b, parent, compartment_name, created_is_completion))
            .collect())
    }

    /// Every maintenance run targeting `infrastructure`, unfiltered.
    pub async fn list_maintenance_runs(
        &self,
        infrastructure: &ResourceNode,
        compartment_name: &str,
    ) -> InvokeResult<Vec<MaintenanceRecord>> {
        let raw = match self.cache.maintenance_runs(&infrastructure.id) {
            Some(hit) => hit,
            None => {
                let upstream = self.upstream.as_ref();
                let target_id = infrastructure.id.as_str();
                let compartment_id = infrastructure.compartment_id.as_str();
                let raw = self
                    .drain("list maintenance runs", move |page| async move {
                        upstream
                            .list_maintenance_runs(target_id, compartment_id, page.as_deref())
                            .await
                    })
                    .await?;
                debug!(
                    infrastructure = %infrastructure.id,
                    runs = raw.len(),
                    "listed maintenance runs"
                );
                self.cache.put_maintenance_runs(&infrastructure.id, raw.clone());
                raw
            }
        };

        Ok(raw
            .into_iter()
            .map(|r| MaintenanceRecord::from_raw(r, infrastructure, compartment_name))
            .collect())
    }

    /// Walk one compartment down to its leaves and filter them by `window`.
    ///
    /// Never fails as a whole: each failed listing is recorded and treated as
    /// empty, and the walk moves on to the next sibling.
    pub async fn walk_branch(
        &self,
        compartment: &ResourceNode,
        window: &TimeWindow,
        keep_all: bool,
    ) -> BranchOutcome {
        let mut outcome = BranchOutcome::default();
        let name = compartment.name.as_str();

        let leaf_parents = match self.profile {
            ReportProfile::Oracle => {
                let homes = self
                    .children_or_record(compartment, ResourceKind::DbHome, name, &mut outcome)
                    .await;
                let mut databases = Vec::new();
                for home in &homes {
                    if outcome.cancelled {
                        break;
                    }
                    let found = self
                        .children_or_record(home, ResourceKind::Database, name, &mut outcome)
                        .await;
                    databases.extend(found);
                }
                databases
            }
            ReportProfile::Mysql => {
                self.children_or_record(compartment, ResourceKind::DbSystem, name, &mut outcome)
                    .await
            }
            ReportProfile::Maintenance => {
                let kind = ResourceKind::ExadataInfrastructure;
                self.children_or_record(compartment, kind, name, &mut outcome)
                    .await
            }
        };

        let mut records = Vec::new();
        let mut runs = Vec::new();
        for parent in &leaf_parents {
            if outcome.cancelled {
                break;
            }
            if self.profile == ReportProfile::Maintenance {
                match self.list_maintenance_runs(parent, name).await {
                    Ok(found) => runs.extend(found),
                    Err(err) => {
                        outcome.record(format!("maintenance run listing for {}", parent.name), err)
                    }
                }
                continue;
            }
            match self.list_backups(parent, name).await {
                Ok(found) => records.extend(found),
                Err(err) => outcome.record(format!("backup listing for {}", parent.name), err),
            }
        }

        outcome.records = filter(records, window, keep_all);
        outcome.maintenance_runs = scheduled_in(runs, window);
        outcome
    }

    async fn children_or_record(
        &self,
        parent: &ResourceNode,
        kind: ResourceKind,
        compartment_name: &str,
        outcome: &mut BranchOutcome,
    ) -> Vec<ResourceNode> {
        match self.list_children(parent, kind).await {
            Ok(children) => children,
            Err(err) => {
                let scope = match parent.kind {
                    ResourceKind::Compartment => format!("{kind} listing under {compartment_name}"),
                    _ => format!("{kind} listing under {} in {compartment_name}", parent.name),
                };
                outcome.record(scope, err);
                Vec::new()
            }
        }
    }

    /// Fetch every page of a listing, in page order, each page through the invoker.
    async fn drain<T, F, Fut>(&self, operation: &str, fetch: F) -> InvokeResult<Vec<T>>
    where
        F: Fn(Option<String>) -> Fut,
        Fut: Future<Output = UpstreamResult<Page<T>>>,
    {
        let mut items = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .invoker
                .invoke(operation, || fetch(token.clone()))
                .await?;
            items.extend(page.items);
            match page.next_page {
                Some(next) => token = Some(next),
                None => return Ok(items),
            }
        }
    }
}

impl BranchOutcome {
    /// Records of either kind this branch contributes to the report.
    pub fn record_count(&self) -> usize {
        self.records.len() + self.maintenance_runs.len()
    }

    fn record(&mut self, scope: String, error: InvokeError) {
        if error.is_cancelled() {
            self.cancelled = true;
            return;
        }
        warn!(scope = %scope, error = %error, "listing failed, continuing with siblings");
        self.failures.push(WalkFailure { scope, error });
    }
}

fn keep_active(
    kind: ResourceKind,
    parent_id: &str,
    raw: Vec<RawResource>,
) -> Vec<ResourceNode> {
    let total = raw.len();
    let nodes: Vec<ResourceNode> = raw
        .into_iter()
        .map(|r| ResourceNode::from_raw(kind, parent_id, r))
        .filter(ResourceNode::is_active)
        .collect();
    if nodes.len() < total {
        debug!(
            parent = %parent_id,
            %kind,
            dropped = total - nodes.len(),
            "dropped inactive nodes"
        );
    }
    nodes
}
