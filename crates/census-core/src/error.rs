//! Error taxonomy for backup-census.
//!
//! - [`InvokeError`]: one upstream call, after pacing, retries and circuit
//! - [`BranchError`]: non-fatal, one per compartment that saw any failure
//! - [`CensusError`]: run-level; only `EnumerationAborted` comes from the walk
//! - [`SinkError`]: report delivery

use chrono::{DateTime, Utc};
use census_upstream::UpstreamError;

/// Errors produced by the rate-limited invoker.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvokeError {
    #[error("{operation}: still rate limited after {attempts} attempt(s): {last}")]
    ThrottleExhausted {
        operation: String,
        attempts: u32,
        last: UpstreamError,
    },

    #[error("{operation}: server errors persisted after {attempts} attempt(s): {last}")]
    ServerErrorExhausted {
        operation: String,
        attempts: u32,
        last: UpstreamError,
    },

    #[error("{operation}: {source}")]
    Upstream {
        operation: String,
        source: UpstreamError,
    },

    #[error(
        "{operation}: circuit open after {consecutive_failures} consecutive failures, retry in {retry_in_ms}ms"
    )]
    CircuitOpen {
        operation: String,
        consecutive_failures: u32,
        retry_in_ms: u64,
    },

    #[error("{operation}: run cancelled")]
    Cancelled { operation: String },
}

impl InvokeError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, InvokeError::Cancelled { .. })
    }
}

/// Result type for invoker operations.
pub type InvokeResult<T> = std::result::Result<T, InvokeError>;

/// A failed listing inside one branch, with where it happened.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkFailure {
    /// e.g. `db_home listing under finance`
    pub scope: String,
    pub error: InvokeError,
}

impl std::fmt::Display for WalkFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.scope, self.error)
    }
}

/// Why a branch is reported as errored.
#[derive(Debug, Clone, PartialEq)]
pub enum BranchFailure {
    /// One or more listings failed; the rest of the branch was still walked.
    Walk(Vec<WalkFailure>),
    /// The branch task itself died.
    Panicked(String),
}

impl std::fmt::Display for BranchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BranchFailure::Walk(failures) => {
                write!(f, "{} failed listing(s)", failures.len())?;
                for failure in failures {
                    write!(f, "; {failure}")?;
                }
                Ok(())
            }
            BranchFailure::Panicked(msg) => write!(f, "task panicked: {msg}"),
        }
    }
}

/// Per-branch, non-fatal error aggregated by the orchestrator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("branch {compartment_name} ({compartment_id}): {failure}")]
pub struct BranchError {
    pub compartment_id: String,
    pub compartment_name: String,
    pub failure: BranchFailure,
}

/// Errors produced while writing a report.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("io error writing {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Run-level errors.
#[derive(Debug, thiserror::Error)]
pub enum CensusError {
    #[error("enumeration aborted: could not list compartments under {root_id}: {source}")]
    EnumerationAborted {
        root_id: String,
        source: InvokeError,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid time window: start {start} is not before end {end}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("report sink error: {0}")]
    Sink(#[from] SinkError),
}

/// Result type for run-level operations.
pub type CensusResult<T> = std::result::Result<T, CensusError>;
