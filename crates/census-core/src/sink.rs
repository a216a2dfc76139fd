//! Report sinks.
//!
//! A sink receives the flattened, ordered record set once per run, as a
//! [`ReportBody`]: backups for the database profiles, maintenance runs for
//! the Exadata one.
//! [`deliver_report`] is the handoff used by the runner: it logs the outcome
//! and never turns a sink failure into a run failure.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, FixedOffset, Utc};
use tracing::warn;

use crate::config::ReportProfile;
use crate::domain::{BackupRecord, MaintenanceRecord, TimeWindow, NOT_AVAILABLE};
use crate::error::SinkError;
use crate::obs;

/// Column headers of the CSV report, in order.
pub const CSV_HEADERS: [&str; 9] = [
    "COMPARTMENT-NAME",
    "DATABASE-NAME",
    "NAME-BACKUP",
    "SIZE_DB(GB)",
    "TYPE",
    "STATE",
    "TIME-STARTED",
    "TIME-ENDED",
    "OCID",
];

/// Column headers of the maintenance CSV report, in order.
pub const MAINTENANCE_CSV_HEADERS: [&str; 5] = [
    "EXADATA-NAME",
    "MAINTENANCE-TYPE",
    "SCHEDULED-UTC",
    "SCHEDULED-LOCAL",
    "PATCHING-TIME",
];

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %:z";

/// The rows of one report.
#[derive(Debug, Clone, Copy)]
pub enum ReportBody<'a> {
    Backups(&'a [BackupRecord]),
    Maintenance(&'a [MaintenanceRecord]),
}

impl ReportBody<'_> {
    pub fn len(&self) -> usize {
        match self {
            ReportBody::Backups(rows) => rows.len(),
            ReportBody::Maintenance(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait ReportSink: Send + Sync {
    fn write(&self, body: ReportBody<'_>) -> Result<(), SinkError>;

    /// Where the report goes, for logs.
    fn target(&self) -> String;
}

/// Hand `body` to `sink`, log the outcome, and report whether it landed.
pub fn deliver_report(sink: &dyn ReportSink, body: ReportBody<'_>) -> bool {
    let target = sink.target();
    match sink.write(body) {
        Ok(()) => {
            obs::emit_report_delivered(&target, body.len(), true);
            true
        }
        Err(err) => {
            warn!(target = %target, error = %err, "report delivery failed");
            obs::emit_report_delivered(&target, body.len(), false);
            false
        }
    }
}

/// `backups-db-oracle-2026-10-18.csv`, `maintenance-exadata-2026-10-18.csv`, ...
pub fn report_file_name(profile: ReportProfile, window: &TimeWindow, extension: &str) -> String {
    let date = window.label_date().format("%Y-%m-%d");
    match profile {
        ReportProfile::Maintenance => format!("maintenance-exadata-{date}.{extension}"),
        _ => format!("backups-db-{}-{date}.{extension}", profile.slug()),
    }
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Writes an RFC 4180 CSV file, timestamps rendered at a fixed display offset.
#[derive(Debug, Clone)]
pub struct CsvReportSink {
    path: PathBuf,
    offset: FixedOffset,
}

impl CsvReportSink {
    pub fn new(path: impl Into<PathBuf>, offset: FixedOffset) -> Self {
        Self {
            path: path.into(),
            offset,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render the whole report, header included, with CRLF line endings.
    pub fn render(&self, body: ReportBody<'_>) -> String {
        match body {
            ReportBody::Backups(records) => self.render_backups(records),
            ReportBody::Maintenance(runs) => self.render_maintenance(runs),
        }
    }

    fn render_backups(&self, records: &[BackupRecord]) -> String {
        let mut out = String::new();
        push_row(&mut out, CSV_HEADERS.iter().map(|h| h.to_string()));
        for r in records {
            push_row(
                &mut out,
                [
                    r.compartment_name.clone(),
                    r.database_name.clone(),
                    r.backup_name.clone(),
                    r.size_display(),
                    r.backup_type.clone(),
                    r.lifecycle_state.clone(),
                    self.format_time(Some(r.time_started)),
                    self.format_time(r.time_ended),
                    r.ocid.clone(),
                ],
            );
        }
        out
    }

    /// One row per run: UTC and display-offset times side by side.
    fn render_maintenance(&self, runs: &[MaintenanceRecord]) -> String {
        let mut out = String::new();
        push_row(&mut out, MAINTENANCE_CSV_HEADERS.iter().map(|h| h.to_string()));
        for r in runs {
            push_row(
                &mut out,
                [
                    r.infrastructure_name.clone(),
                    r.maintenance_type.clone(),
                    format_time_at(r.time_scheduled, Utc),
                    self.format_time(r.time_scheduled),
                    r.patching_display(),
                ],
            );
        }
        out
    }

    fn format_time(&self, t: Option<DateTime<Utc>>) -> String {
        format_time_at(t, self.offset)
    }
}

fn format_time_at<Tz: chrono::TimeZone>(t: Option<DateTime<Utc>>, tz: Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match t {
        Some(t) => t.with_timezone(&tz).format(TIME_FORMAT).to_string(),
        None => NOT_AVAILABLE.to_string(),
    }
}

impl ReportSink for CsvReportSink {
    fn write(&self, body: ReportBody<'_>) -> Result<(), SinkError> {
        if body.is_empty() {
            warn!(path = %self.path.display(), "nothing in window, writing header only");
        }
        std::fs::write(&self.path, self.render(body)).map_err(|source| SinkError::Io {
            path: self.path.display().to_string(),
            source,
        })
    }

    fn target(&self) -> String {
        self.path.display().to_string()
    }
}

fn push_row(out: &mut String, fields: impl IntoIterator<Item = String>) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&quote(&field));
    }
    out.push_str("\r\n");
}

/// Quote a field if it contains a delimiter, quote, or line break.
fn quote(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// Writes the rows as a pretty-printed JSON array (UTC timestamps).
#[derive(Debug, Clone)]
pub struct JsonReportSink {
    path: PathBuf,
}

impl JsonReportSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ReportSink for JsonReportSink {
    fn write(&self, body: ReportBody<'_>) -> Result<(), SinkError> {
        let json = match body {
            ReportBody::Backups(records) => serde_json::to_string_pretty(records)?,
            ReportBody::Maintenance(runs) => serde_json::to_string_pretty(runs)?,
        };
        std::fs::write(&self.path, json).map_err(|source| SinkError::Io {
            path: self.path.display().to_string(),
            source,
        })
    }

    fn target(&self) -> String {
        self.path.display().to_string()
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// A batch kept by [`MemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Backups(Vec<BackupRecord>),
    Maintenance(Vec<MaintenanceRecord>),
}

/// Keeps every delivered batch in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    delivered: Mutex<Vec<Delivery>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Batches received so far, oldest first.
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ReportSink for MemorySink {
    fn write(&self, body: ReportBody<'_>) -> Result<(), SinkError> {
        let batch = match body {
            ReportBody::Backups(records) => Delivery::Backups(records.to_vec()),
            ReportBody::Maintenance(runs) => Delivery::Maintenance(runs.to_vec()),
        };
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(batch);
        Ok(())
    }

    fn target(&self) -> String {
        "memory".to_string()
    }
}
