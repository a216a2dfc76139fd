//! Upstream capability trait and wire types.
//!
//! The enumeration engine depends only on [`UpstreamApi`]:
//! - `list_compartments`: top-level grouping nodes under a root
//! - `list_child_resources`: db homes, databases, db systems or Exadata
//!   infrastructures under a parent
//! - `list_leaf_records`: backups of a database (or MySQL db system)
//! - `list_maintenance_runs`: maintenance runs targeting an Exadata infrastructure
//!
//! Every call is page-able. Callers pass the `next_page` token of the previous
//! page back in until it comes back `None`.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::UpstreamResult;

// ---------------------------------------------------------------------------
// ResourceKind
// ---------------------------------------------------------------------------

/// Kind of an interior node in the resource hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Compartment,
    DbHome,
    Database,
    /// MySQL database system; parents backups directly.
    DbSystem,
    /// Cloud Exadata infrastructure; target of maintenance runs.
    ExadataInfrastructure,
}

impl ResourceKind {
    /// Path segment used by REST gateways for listing this kind.
    pub fn collection(self) -> &'static str {
        match self {
            ResourceKind::Compartment => "compartments",
            ResourceKind::DbHome => "dbHomes",
            ResourceKind::Database => "databases",
            ResourceKind::DbSystem => "dbSystems",
            ResourceKind::ExadataInfrastructure => "cloudExadataInfrastructures",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceKind::Compartment => "compartment",
            ResourceKind::DbHome => "db_home",
            ResourceKind::Database => "database",
            ResourceKind::DbSystem => "db_system",
            ResourceKind::ExadataInfrastructure => "exadata_infrastructure",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// A hierarchy node as returned by the upstream, before activity filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawResource {
    pub id: String,
    /// Display name (or `dbName` for databases)
    #[serde(alias = "displayName", alias = "dbName")]
    pub name: String,
    /// Compartment that owns this node
    pub compartment_id: String,
    pub lifecycle_state: String,
}

impl RawResource {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        compartment_id: impl Into<String>,
        lifecycle_state: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            compartment_id: compartment_id.into(),
            lifecycle_state: lifecycle_state.into(),
        }
    }
}

/// A backup as returned by the upstream.
///
/// Timestamps keep whatever offset the upstream reported; normalising to UTC
/// is the consumer's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBackup {
    pub id: String,
    pub display_name: String,
    #[serde(default, alias = "dataStorageSizeInGbs")]
    pub database_size_in_gbs: Option<f64>,
    #[serde(default, alias = "type")]
    pub backup_type: Option<String>,
    pub lifecycle_state: String,
    #[serde(alias = "timeCreated")]
    pub time_started: DateTime<FixedOffset>,
    #[serde(default)]
    pub time_ended: Option<DateTime<FixedOffset>>,
}

/// Patching estimate attached to a maintenance run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchingEstimate {
    /// Whole-run estimate in minutes
    #[serde(default)]
    pub total_estimated_patching_time: Option<u32>,
}

/// A maintenance run as returned by the upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMaintenanceRun {
    pub id: String,
    pub display_name: String,
    /// `SCHEDULED`, `IN_PROGRESS`, `SUCCEEDED`, ...
    pub lifecycle_state: String,
    #[serde(default)]
    pub maintenance_subtype: Option<String>,
    #[serde(default)]
    pub time_scheduled: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub estimated_patching_time: Option<PatchingEstimate>,
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Opaque continuation token; `None` on the last page.
    pub next_page: Option<String>,
}

impl<T> Page<T> {
    /// A single, final page.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_page: None,
        }
    }
}

// ---------------------------------------------------------------------------
// UpstreamApi
// ---------------------------------------------------------------------------

/// Read-only capability set of the remote management API.
///
/// Implementations must be cheap to share across tasks (`Send + Sync`) and
/// must not retry internally; retry policy belongs to the caller.
#[async_trait]
pub trait UpstreamApi: Send + Sync {
    /// List every compartment in the subtree under `root_id`.
    async fn list_compartments(
        &self,
        root_id: &str,
        page: Option<&str>,
    ) -> UpstreamResult<Page<RawResource>>;

    /// List children of `kind` under `parent_id`, scoped to `compartment_id`.
    async fn list_child_resources(
        &self,
        kind: ResourceKind,
        parent_id: &str,
        compartment_id: &str,
        page: Option<&str>,
    ) -> UpstreamResult<Page<RawResource>>;

    /// List backups whose parent (database or db system) is `parent_id`.
    async fn list_leaf_records(
        &self,
        parent_id: &str,
        compartment_id: &str,
        page: Option<&str>,
    ) -> UpstreamResult<Page<RawBackup>>;

    /// List maintenance runs targeting `target_id`, scoped to `compartment_id`.
    async fn list_maintenance_runs(
        &self,
        target_id: &str,
        compartment_id: &str,
        page: Option<&str>,
    ) -> UpstreamResult<Page<RawMaintenanceRun>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_backup_accepts_upstream_field_aliases() {
        let json = serde_json::json!({
            "id": "ocid1.dbbackup.oc1..aaa",
            "displayName": "Automatic Backup",
            "databaseSizeInGbs": 42.5,
            "type": "INCREMENTAL",
            "lifecycleState": "ACTIVE",
            "timeStarted": "2026-10-18T01:00:00-06:00",
            "timeEnded": "2026-10-18T01:30:00-06:00"
        });
        let backup: RawBackup = serde_json::from_value(json).unwrap();
        assert_eq!(backup.backup_type.as_deref(), Some("INCREMENTAL"));
        assert_eq!(backup.database_size_in_gbs, Some(42.5));
        assert_eq!(backup.time_ended.unwrap().offset().local_minus_utc(), -6 * 3600);
    }

    #[test]
    fn test_mysql_backup_maps_time_created_and_storage_size() {
        let json = serde_json::json!({
            "id": "ocid1.mysqlbackup.oc1..bbb",
            "displayName": "mysql-nightly",
            "dataStorageSizeInGbs": 50.0,
            "backupType": "FULL",
            "lifecycleState": "ACTIVE",
            "timeCreated": "2026-10-18T03:00:00Z"
        });
        let backup: RawBackup = serde_json::from_value(json).unwrap();
        assert_eq!(backup.database_size_in_gbs, Some(50.0));
        assert!(backup.time_ended.is_none());
    }

    #[test]
    fn test_maintenance_run_decodes_nested_estimate() {
        let json = serde_json::json!({
            "id": "ocid1.dbmaintenancerun.oc1..eee",
            "displayName": "Quarterly patch",
            "lifecycleState": "SCHEDULED",
            "maintenanceSubtype": "QUARTERLY",
            "timeScheduled": "2026-10-20T08:00:00Z",
            "estimatedPatchingTime": { "totalEstimatedPatchingTime": 150 }
        });
        let run: RawMaintenanceRun = serde_json::from_value(json).unwrap();
        assert_eq!(run.maintenance_subtype.as_deref(), Some("QUARTERLY"));
        assert_eq!(
            run.estimated_patching_time
                .and_then(|e| e.total_estimated_patching_time),
            Some(150)
        );

        let bare = serde_json::json!({
            "id": "r2",
            "displayName": "unscheduled",
            "lifecycleState": "SCHEDULED"
        });
        let run: RawMaintenanceRun = serde_json::from_value(bare).unwrap();
        assert!(run.time_scheduled.is_none());
        assert!(run.estimated_patching_time.is_none());
    }

    #[test]
    fn test_raw_resource_accepts_db_name() {
        let json = serde_json::json!({
            "id": "ocid1.database.oc1..ccc",
            "dbName": "ORCL",
            "compartmentId": "ocid1.compartment.oc1..ddd",
            "lifecycleState": "AVAILABLE"
        });
        let res: RawResource = serde_json::from_value(json).unwrap();
        assert_eq!(res.name, "ORCL");
    }
}
