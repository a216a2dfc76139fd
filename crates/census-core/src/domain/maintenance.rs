//! Exadata maintenance runs.

use census_upstream::RawMaintenanceRun;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::backup::NOT_AVAILABLE;
use super::node::ResourceNode;

/// Lifecycle state of a run that has not started yet.
pub const SCHEDULED_STATE: &str = "SCHEDULED";

/// One maintenance run against one Exadata infrastructure, flattened for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceRecord {
    pub ocid: String,
    pub run_name: String,
    pub infrastructure_id: String,
    pub infrastructure_name: String,
    pub compartment_name: String,
    pub maintenance_type: String,
    pub lifecycle_state: String,
    pub time_scheduled: Option<DateTime<Utc>>,
    /// Estimated patching time in minutes
    pub patching_minutes: Option<u32>,
}

impl MaintenanceRecord {
    pub fn from_raw(
        raw: RawMaintenanceRun,
        infrastructure: &ResourceNode,
        compartment_name: &str,
    ) -> Self {
        Self {
            ocid: raw.id,
            run_name: raw.display_name,
            infrastructure_id: infrastructure.id.clone(),
            infrastructure_name: infrastructure.name.clone(),
            compartment_name: compartment_name.to_string(),
            maintenance_type: raw
                .maintenance_subtype
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            lifecycle_state: raw.lifecycle_state,
            time_scheduled: raw.time_scheduled.map(|t| t.with_timezone(&Utc)),
            patching_minutes: raw
                .estimated_patching_time
                .and_then(|e| e.total_estimated_patching_time)
                .filter(|m| *m > 0),
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.lifecycle_state.eq_ignore_ascii_case(SCHEDULED_STATE)
    }

    /// `2h 30m`, or `N/A` without an estimate.
    pub fn patching_display(&self) -> String {
        match self.patching_minutes {
            Some(m) => format!("{}h {}m", m / 60, m % 60),
            None => NOT_AVAILABLE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use census_upstream::{PatchingEstimate, RawResource, ResourceKind};
    use chrono::DateTime;

    fn exadata() -> ResourceNode {
        ResourceNode::from_raw(
            ResourceKind::ExadataInfrastructure,
            "c1",
            RawResource::new("exa1", "exa-prod", "c1", "AVAILABLE"),
        )
    }

    fn raw(minutes: Option<u32>) -> RawMaintenanceRun {
        RawMaintenanceRun {
            id: "r1".to_string(),
            display_name: "quarterly".to_string(),
            lifecycle_state: "SCHEDULED".to_string(),
            maintenance_subtype: None,
            time_scheduled: Some(DateTime::parse_from_rfc3339("2026-10-20T02:00:00-06:00").unwrap()),
            estimated_patching_time: Some(PatchingEstimate {
                total_estimated_patching_time: minutes,
            }),
        }
    }

    #[test]
    fn test_flattened_under_its_infrastructure() {
        let rec = MaintenanceRecord::from_raw(raw(Some(150)), &exadata(), "finance");
        assert_eq!(rec.infrastructure_name, "exa-prod");
        assert_eq!(rec.compartment_name, "finance");
        assert_eq!(rec.maintenance_type, "N/A");
        assert_eq!(
            rec.time_scheduled.unwrap().to_rfc3339(),
            "2026-10-20T08:00:00+00:00"
        );
        assert!(rec.is_scheduled());
    }

    #[test]
    fn test_patching_time_renders_hours_and_minutes() {
        let exa = exadata();
        assert_eq!(MaintenanceRecord::from_raw(raw(Some(150)), &exa, "f").patching_display(), "2h 30m");
        assert_eq!(MaintenanceRecord::from_raw(raw(Some(45)), &exa, "f").patching_display(), "0h 45m");
        assert_eq!(MaintenanceRecord::from_raw(raw(Some(0)), &exa, "f").patching_display(), "N/A");
        assert_eq!(MaintenanceRecord::from_raw(raw(None), &exa, "f").patching_display(), "N/A");
    }
}
