//! Backup records.

use chrono::{DateTime, Utc};
use census_upstream::RawBackup;
use serde::{Deserialize, Serialize};

use super::node::ResourceNode;

/// Placeholder used by reports for missing values.
pub const NOT_AVAILABLE: &str = "N/A";

/// One backup of one database, flattened for reporting.
///
/// All timestamps are UTC; display offsets are applied by sinks only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub ocid: String,
    pub backup_name: String,
    pub database_id: String,
    pub database_name: String,
    pub compartment_name: String,
    /// Size in GB when the upstream reports it
    pub size_gb: Option<f64>,
    pub backup_type: String,
    pub lifecycle_state: String,
    pub time_started: DateTime<Utc>,
    /// Completion time; records without one never pass the window filter
    pub time_ended: Option<DateTime<Utc>>,
}

impl BackupRecord {
    /// Flatten an upstream backup under its parent database.
    ///
    /// When `created_is_completion` is set (MySQL db systems report only a
    /// creation time), a missing end time falls back to the start time.
    pub fn from_raw(
        raw: RawBackup,
        database: &ResourceNode,
        compartment_name: &str,
        created_is_completion: bool,
    ) -> Self {
        let time_started = raw.time_started.with_timezone(&Utc);
        let time_ended = raw
            .time_ended
            .map(|t| t.with_timezone(&Utc))
            .or_else(|| created_is_completion.then_some(time_started));

        Self {
            ocid: raw.id,
            backup_name: raw.display_name,
            database_id: database.id.clone(),
            database_name: database.name.clone(),
            compartment_name: compartment_name.to_string(),
            size_gb: raw.database_size_in_gbs,
            backup_type: raw
                .backup_type
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            lifecycle_state: raw.lifecycle_state,
            time_started,
            time_ended,
        }
    }

    /// Size rendered for reports: the number, or `N/A`.
    pub fn size_display(&self) -> String {
        self.size_gb
            .map(|s| s.to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }
}
