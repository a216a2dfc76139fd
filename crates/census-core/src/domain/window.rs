//! Reporting time window.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CensusError, CensusResult};

/// UTC hour at which the maintenance look-ahead starts.
pub const MAINTENANCE_START_HOUR: u32 = 19;

/// Length of the maintenance look-ahead.
pub const MAINTENANCE_HORIZON_DAYS: i64 = 7;

/// Half-open UTC interval `[start, end)`, fixed for the lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    /// Explicit window; rejects empty or inverted intervals.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> CensusResult<Self> {
        if start >= end {
            return Err(CensusError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// The whole UTC calendar day `date`.
    pub fn utc_day(date: NaiveDate) -> Self {
        let start = date.and_time(NaiveTime::MIN).and_utc();
        Self {
            start,
            end: start + Duration::days(1),
        }
    }

    /// Seven days of upcoming maintenance from `date` at 19:00 UTC.
    pub fn maintenance_week(date: NaiveDate) -> Self {
        let start = date
            .and_hms_opt(MAINTENANCE_START_HOUR, 0, 0)
            .unwrap_or(date.and_time(NaiveTime::MIN))
            .and_utc();
        Self {
            start,
            end: start + Duration::days(MAINTENANCE_HORIZON_DAYS),
        }
    }

    /// Yesterday, midnight to midnight UTC, relative to one clock snapshot.
    pub fn previous_utc_day(now: DateTime<Utc>) -> Self {
        Self::utc_day(now.date_naive() - Duration::days(1))
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Calendar date of the window start, used in report names.
    pub fn label_date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    /// `start <= t < end`
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_previous_utc_day_from_late_evening_snapshot() {
        let window = TimeWindow::previous_utc_day(ts("2026-10-19T23:59:59Z"));
        assert_eq!(window.start(), ts("2026-10-18T00:00:00Z"));
        assert_eq!(window.end(), ts("2026-10-19T00:00:00Z"));
        assert_eq!(window.label_date().to_string(), "2026-10-18");
    }

    #[test]
    fn test_half_open_boundaries() {
        let window = TimeWindow::utc_day(NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
        assert!(window.contains(window.start()));
        assert!(!window.contains(window.end()));
        assert!(window.contains(window.end() - Duration::nanoseconds(1)));
        assert!(!window.contains(window.start() - Duration::nanoseconds(1)));
    }

    #[test]
    fn test_maintenance_week_starts_at_evening_of_date() {
        let window = TimeWindow::maintenance_week(NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
        assert_eq!(window.start(), ts("2026-10-18T19:00:00Z"));
        assert_eq!(window.end(), ts("2026-10-25T19:00:00Z"));
        assert_eq!(window.label_date().to_string(), "2026-10-18");
        assert!(!window.contains(ts("2026-10-18T18:59:59Z")));
    }

    #[test]
    fn test_inverted_window_is_rejected() {
        let a = ts("2026-10-18T00:00:00Z");
        assert!(TimeWindow::new(a, a).is_err());
        assert!(TimeWindow::new(a + Duration::hours(1), a).is_err());
        assert!(TimeWindow::new(a, a + Duration::hours(1)).is_ok());
    }
}
