//! Daily call-budget tracking.
//!
//! One record, overwritten in place (write-then-rename), so a restart never
//! forgets how much of today's budget is already spent. Storage failures on
//! load are fail-open: exceeding the budget by a few calls is lower-risk
//! than refusing to run, so a corrupt or missing file just resets the
//! counter for today.
//!
//! Known drift: a crash after a successful remote call but before
//! [`QuotaTracker::record_call`] persists under-counts that day by at most
//! one call.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Time source seam so day rollover is testable without wall time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("failed to persist quota state to {path}: {source}")]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode quota state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable record of today's spend against the budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaState {
    pub date: NaiveDate,
    pub calls_made: u32,
    pub daily_limit: u32,
}

/// Sole owner and writer of the quota state file.
pub struct QuotaTracker {
    state: QuotaState,
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl QuotaTracker {
    /// Load persisted state, or start fresh for today if the file is
    /// missing, unreadable, or does not parse.
    pub fn open(path: PathBuf, daily_limit: u32, clock: Arc<dyn Clock>) -> Self {
        let today = clock.now().date_naive();

        let state = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<QuotaState>(&raw) {
                Ok(mut persisted) => {
                    // the configured limit wins over whatever was persisted
                    persisted.daily_limit = daily_limit;
                    persisted.calls_made = persisted.calls_made.min(daily_limit);
                    debug!(
                        date = %persisted.date,
                        calls_made = persisted.calls_made,
                        "loaded quota state"
                    );
                    persisted
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "quota state unparsable, starting fresh");
                    QuotaState {
                        date: today,
                        calls_made: 0,
                        daily_limit,
                    }
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no quota state yet, starting fresh");
                QuotaState {
                    date: today,
                    calls_made: 0,
                    daily_limit,
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "quota state unreadable, starting fresh");
                QuotaState {
                    date: today,
                    calls_made: 0,
                    daily_limit,
                }
            }
        };

        QuotaTracker { state, path, clock }
    }

    /// True iff a remote call is still within today's budget. Rolls the
    /// counter over first if the tracked day has passed.
    pub fn can_call(&mut self) -> bool {
        self.roll_over_if_stale();
        self.state.calls_made < self.state.daily_limit
    }

    /// Charge one call against today's budget and persist before returning.
    pub fn record_call(&mut self) -> Result<(), QuotaError> {
        self.roll_over_if_stale();
        self.state.calls_made = (self.state.calls_made + 1).min(self.state.daily_limit);
        self.persist()
    }

    pub fn state(&self) -> &QuotaState {
        &self.state
    }

    fn roll_over_if_stale(&mut self) {
        let today = self.clock.now().date_naive();
        if self.state.date != today {
            info!(from = %self.state.date, to = %today, "quota day rollover");
            self.state.date = today;
            self.state.calls_made = 0;
        }
    }

    /// Write the whole record to a sibling temp file, then rename over the
    /// real one. Readers never see a torn record.
    fn persist(&self) -> Result<(), QuotaError> {
        let encoded = serde_json::to_vec_pretty(&self.state)?;
        let tmp = self.path.with_extension("json.tmp");

        fs::write(&tmp, encoded)
            .and_then(|()| fs::rename(&tmp, &self.path))
            .map_err(|source| QuotaError::Persist {
                path: self.path.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;
    use tempfile::TempDir;

    pub struct FakeClock {
        now: Mutex<DateTime<Local>>,
    }

    impl FakeClock {
        pub fn at(year: i32, month: u32, day: u32) -> Arc<Self> {
            let now = Local.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap();
            Arc::new(FakeClock {
                now: Mutex::new(now),
            })
        }

        pub fn set(&self, year: i32, month: u32, day: u32) {
            let now = Local.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap();
            *self.now.lock().unwrap() = now;
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> DateTime<Local> {
            *self.now.lock().unwrap()
        }
    }

    fn quota_path(dir: &TempDir) -> PathBuf {
        dir.path().join("quota.json")
    }

    #[test]
    fn budget_is_never_exceeded_within_one_day() {
        let dir = TempDir::new().unwrap();
        let clock = FakeClock::at(2026, 3, 14);
        let mut tracker = QuotaTracker::open(quota_path(&dir), 3, clock);

        for _ in 0..3 {
            assert!(tracker.can_call());
            tracker.record_call().unwrap();
        }

        assert!(!tracker.can_call());
        assert_eq!(tracker.state().calls_made, 3);
    }

    #[test]
    fn day_rollover_resets_an_exhausted_budget() {
        let dir = TempDir::new().unwrap();
        let clock = FakeClock::at(2026, 3, 14);
        let mut tracker = QuotaTracker::open(quota_path(&dir), 2, clock.clone());

        tracker.record_call().unwrap();
        tracker.record_call().unwrap();
        assert!(!tracker.can_call());

        clock.set(2026, 3, 15);
        assert!(tracker.can_call());
        assert_eq!(tracker.state().calls_made, 0);
        assert_eq!(
            tracker.state().date,
            NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
        );
    }

    #[test]
    fn state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let clock = FakeClock::at(2026, 3, 14);

        let mut tracker = QuotaTracker::open(quota_path(&dir), 5, clock.clone());
        tracker.record_call().unwrap();
        tracker.record_call().unwrap();
        drop(tracker);

        let reopened = QuotaTracker::open(quota_path(&dir), 5, clock);
        assert_eq!(reopened.state().calls_made, 2);
    }

    #[test]
    fn unparsable_state_file_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let path = quota_path(&dir);
        fs::write(&path, b"\xff\xfe not json at all").unwrap();

        let clock = FakeClock::at(2026, 3, 14);
        let mut tracker = QuotaTracker::open(path, 5, clock);

        assert_eq!(tracker.state().calls_made, 0);
        assert_eq!(
            tracker.state().date,
            NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
        );
        assert!(tracker.can_call());
    }

    #[test]
    fn persisted_count_above_a_lowered_limit_is_clamped() {
        let dir = TempDir::new().unwrap();
        let clock = FakeClock::at(2026, 3, 14);

        let mut tracker = QuotaTracker::open(quota_path(&dir), 10, clock.clone());
        for _ in 0..10 {
            tracker.record_call().unwrap();
        }
        drop(tracker);

        let mut reopened = QuotaTracker::open(quota_path(&dir), 4, clock);
        assert_eq!(reopened.state().calls_made, 4);
        assert!(!reopened.can_call());
    }
}
