//! Domain models for backup-census.
//!
//! Canonical definitions for the core entities:
//! - `ResourceNode`: An active node of the compartment hierarchy
//! - `BackupRecord`: One backup, normalised to UTC, ready for reporting
//! - `MaintenanceRecord`: One Exadata maintenance run
//! - `TimeWindow`: The half-open UTC interval a run reports on

pub mod backup;
pub mod maintenance;
pub mod node;
pub mod window;

pub use backup::{BackupRecord, NOT_AVAILABLE};
pub use maintenance::{MaintenanceRecord, SCHEDULED_STATE};
pub use node::{is_active_state, ResourceNode, ACTIVE_STATES};
pub use window::TimeWindow;
