//! Time-window selection of backup records and maintenance runs.

use std::collections::HashMap;

use crate::domain::{BackupRecord, MaintenanceRecord, TimeWindow};

/// Keep records whose completion time falls in `window`.
///
/// With `keep_all` every match is kept in input order. Otherwise one record
/// per database survives: the latest by `time_ended`, then `time_started`,
/// then the earliest input position; databases keep the order in which they
/// first matched.
pub fn filter(records: Vec<BackupRecord>, window: &TimeWindow, keep_all: bool) -> Vec<BackupRecord> {
    let matching = records
        .into_iter()
        .filter(|r| r.time_ended.is_some_and(|t| window.contains(t)));

    if keep_all {
        return matching.collect();
    }

    let mut latest: Vec<BackupRecord> = Vec::new();
    let mut slot_of: HashMap<String, usize> = HashMap::new();
    for record in matching {
        match slot_of.get(&record.database_id) {
            Some(&slot) => {
                if is_later(&record, &latest[slot]) {
                    latest[slot] = record;
                }
            }
            None => {
                slot_of.insert(record.database_id.clone(), latest.len());
                latest.push(record);
            }
        }
    }
    latest
}

/// Keep runs still `SCHEDULED` whose scheduled time falls in `window`, in input order.
pub fn scheduled_in(runs: Vec<MaintenanceRecord>, window: &TimeWindow) -> Vec<MaintenanceRecord> {
    runs.into_iter()
        .filter(|r| r.is_scheduled() && r.time_scheduled.is_some_and(|t| window.contains(t)))
        .collect()
}

/// Strictly later; an equal candidate loses to the one seen first.
fn is_later(candidate: &BackupRecord, current: &BackupRecord) -> bool {
    (candidate.time_ended, candidate.time_started) > (current.time_ended, current.time_started)
}
