//! backup-census core library
//!
//! Rate-limited, fault-tolerant enumeration of cloud database backups:
//! compartments → db homes → databases → backups (or compartments → MySQL db
//! systems → backups), filtered to a time window and handed to a report sink.
//! The same walk also lists scheduled Exadata maintenance runs
//! (compartments → Exadata infrastructures → maintenance runs).

pub mod cache;
pub mod cancel;
pub mod config;
pub mod domain;
pub mod error;
pub mod filter;
pub mod invoker;
pub mod obs;
pub mod orchestrator;
pub mod sink;
pub mod telemetry;
pub mod walker;

pub use cache::{ChildKey, RunCache};
pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use config::{CensusConfig, InvokerConfig, ReportProfile};
pub use domain::{BackupRecord, MaintenanceRecord, ResourceNode, TimeWindow};
pub use error::{
    BranchError, BranchFailure, CensusError, CensusResult, InvokeError, InvokeResult, SinkError,
    WalkFailure,
};
pub use filter::{filter, scheduled_in};
pub use invoker::{Invoker, InvokerStats, StatsSnapshot};
pub use orchestrator::{Orchestrator, RunReport, RunSummary};
pub use sink::{
    deliver_report, report_file_name, CsvReportSink, Delivery, JsonReportSink, MemorySink,
    ReportBody, ReportSink,
};
pub use telemetry::init_tracing;
pub use walker::{BranchOutcome, Walker};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
