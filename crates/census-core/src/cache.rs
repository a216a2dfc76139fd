//! Per-run memo of child listings and leaf listings.
//!
//! Leaves are cached as the upstream returned them: the compartment a record
//! is reported under depends on the path that reached it, so it is attached
//! on the way out, not stored.
//!
//! Shared by every branch task of one run and dropped with it. Entries are
//! inserted whole, so a concurrent reader sees either nothing or a complete
//! listing. Two tasks racing on the same miss both fetch and the second
//! insert overwrites the first with identical data.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use census_upstream::{RawBackup, RawMaintenanceRun, ResourceKind};

use crate::domain::ResourceNode;

/// Cache key for a child listing: the parent and the kind of child requested.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChildKey {
    pub parent_id: String,
    pub kind: ResourceKind,
}

impl ChildKey {
    pub fn new(parent_id: &str, kind: ResourceKind) -> Self {
        Self {
            parent_id: parent_id.to_string(),
            kind,
        }
    }
}

#[derive(Debug, Default)]
pub struct RunCache {
    children: RwLock<HashMap<ChildKey, Vec<ResourceNode>>>,
    backups: RwLock<HashMap<String, Vec<RawBackup>>>,
    maintenance_runs: RwLock<HashMap<String, Vec<RawMaintenanceRun>>>,
}

impl RunCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn children(&self, key: &ChildKey) -> Option<Vec<ResourceNode>> {
        self.children
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn put_children(&self, key: ChildKey, nodes: Vec<ResourceNode>) {
        self.children
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, nodes);
    }

    /// Cached backups of one database (or db system), before window filtering.
    pub fn backups(&self, parent_id: &str) -> Option<Vec<RawBackup>> {
        self.backups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(parent_id)
            .cloned()
    }

    pub fn put_backups(&self, parent_id: &str, backups: Vec<RawBackup>) {
        self.backups
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(parent_id.to_string(), backups);
    }

    /// Cached maintenance runs targeting one Exadata infrastructure.
    pub fn maintenance_runs(&self, target_id: &str) -> Option<Vec<RawMaintenanceRun>> {
        self.maintenance_runs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(target_id)
            .cloned()
    }

    pub fn put_maintenance_runs(&self, target_id: &str, runs: Vec<RawMaintenanceRun>) {
        self.maintenance_runs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(target_id.to_string(), runs);
    }

    /// Number of cached listings of any kind.
    pub fn len(&self) -> usize {
        let children = self
            .children
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        let backups = self
            .backups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        let runs = self
            .maintenance_runs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        children + backups + runs
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
