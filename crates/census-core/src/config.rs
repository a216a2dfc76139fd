//! Run configuration.
//!
//! [`CensusConfig`] is deserialised from TOML with every field defaulted, so an
//! empty file (or no file) yields the stock policy. The CLI layers flags and
//! `CENSUS_*` environment variables on top.

use std::path::Path;
use std::time::Duration;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::error::{CensusError, CensusResult};

/// Upper bound on a single backoff sleep (one day).
const MAX_BACKOFF_MS: f64 = 86_400_000.0;

/// Which hierarchy a run walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportProfile {
    /// compartment → db home → database → backup
    #[default]
    Oracle,
    /// compartment → MySQL db system → backup
    Mysql,
    /// compartment → Exadata infrastructure → scheduled maintenance run
    Maintenance,
}

impl ReportProfile {
    /// Short name used in report file names.
    pub fn slug(self) -> &'static str {
        match self {
            ReportProfile::Oracle => "oracle",
            ReportProfile::Mysql => "mysql",
            ReportProfile::Maintenance => "maintenance",
        }
    }

    /// MySQL backups carry only a creation time, which marks completion.
    pub fn created_is_completion(self) -> bool {
        matches!(self, ReportProfile::Mysql)
    }

    /// The root owns infrastructure too, so maintenance runs always walk it.
    pub fn includes_root(self) -> bool {
        matches!(self, ReportProfile::Maintenance)
    }
}

impl std::str::FromStr for ReportProfile {
    type Err = CensusError;

    fn from_str(s: &str) -> CensusResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "oracle" => Ok(ReportProfile::Oracle),
            "mysql" => Ok(ReportProfile::Mysql),
            "maintenance" | "exadata" => Ok(ReportProfile::Maintenance),
            other => Err(CensusError::InvalidConfig(format!(
                "unknown profile '{other}' (expected oracle, mysql or maintenance)"
            ))),
        }
    }
}

/// Pacing, retry and circuit-breaker policy for upstream calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InvokerConfig {
    /// Minimum spacing between the starts of two upstream calls (milliseconds).
    pub min_request_interval_ms: u64,
    /// Maximum number of retries for throttled or 5xx calls (0 = run once).
    pub max_retries: u32,
    /// Exponential growth of the backoff delay per retry.
    pub backoff_factor: f64,
    /// Delay before the first retry (milliseconds).
    pub backoff_base_ms: u64,
    /// Consecutive failures that open the circuit.
    pub circuit_failure_threshold: u32,
    /// How long an open circuit rejects calls (milliseconds).
    pub circuit_cooldown_ms: u64,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            min_request_interval_ms: 500,
            max_retries: 3,
            backoff_factor: 2.0,
            backoff_base_ms: 1_000,
            circuit_failure_threshold: 5,
            circuit_cooldown_ms: 60_000,
        }
    }
}

impl InvokerConfig {
    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn circuit_cooldown(&self) -> Duration {
        Duration::from_millis(self.circuit_cooldown_ms)
    }

    /// Delay before retry number `attempt` (0-based): `base * factor ^ attempt`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let ms = (self.backoff_base_ms as f64 * self.backoff_factor.powi(exp)).round();
        Duration::from_millis(ms.clamp(0.0, MAX_BACKOFF_MS) as u64)
    }

    pub fn validate(&self) -> CensusResult<()> {
        if self.circuit_failure_threshold == 0 {
            return Err(CensusError::InvalidConfig(
                "circuit_failure_threshold must be at least 1".to_string(),
            ));
        }
        if !(self.backoff_factor.is_finite() && self.backoff_factor >= 1.0) {
            return Err(CensusError::InvalidConfig(format!(
                "backoff_factor must be a finite number >= 1.0, got {}",
                self.backoff_factor
            )));
        }
        Ok(())
    }
}

/// Everything a run needs besides the upstream and the window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CensusConfig {
    pub profile: ReportProfile,
    /// Upper bound on concurrently walked compartments.
    pub max_concurrent_branches: usize,
    /// Keep every in-window backup per database, or only the latest.
    pub keep_all_matches_per_leaf: bool,
    /// Walk the root itself as a branch, in addition to its compartments.
    pub include_root_compartment: bool,
    /// Fixed offset used when rendering timestamps in reports (minutes east of UTC).
    pub display_offset_minutes: i32,
    pub invoker: InvokerConfig,
}

impl Default for CensusConfig {
    fn default() -> Self {
        Self {
            profile: ReportProfile::Oracle,
            max_concurrent_branches: 3,
            keep_all_matches_per_leaf: true,
            include_root_compartment: false,
            display_offset_minutes: 0,
            invoker: InvokerConfig::default(),
        }
    }
}

impl CensusConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(raw: &str) -> CensusResult<Self> {
        toml::from_str(raw).map_err(|e| CensusError::InvalidConfig(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: &Path) -> CensusResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CensusError::InvalidConfig(format!("read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> CensusResult<()> {
        if self.max_concurrent_branches == 0 {
            return Err(CensusError::InvalidConfig(
                "max_concurrent_branches must be at least 1".to_string(),
            ));
        }
        self.display_offset()?;
        self.invoker.validate()
    }

    pub fn display_offset(&self) -> CensusResult<FixedOffset> {
        FixedOffset::east_opt(self.display_offset_minutes * 60).ok_or_else(|| {
            CensusError::InvalidConfig(format!(
                "display_offset_minutes out of range: {}",
                self.display_offset_minutes
            ))
        })
    }
}
