//! Poll scheduler.
//!
//! A single cooperative loop: every tick asks the quota tracker for
//! permission, fetches one snapshot, charges the call, appends it to the
//! log, and updates the gauges. Skips and failures are logged and never
//! fatal. [`Poller::tick`] is an explicit function so tests can drive the
//! schedule without a timer.
//!
//! Failed fetches charge no local quota. If the vendor counts attempts
//! server-side, the two counters diverge; client-side tracking cannot see
//! the vendor's counter.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::api::VehicleApi;
use crate::quota::QuotaTracker;
use crate::serve::metrics::Metrics;
use crate::store::TelemetryLog;

/// What a single tick did, for logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Snapshot fetched, quota charged, record appended.
    Fetched,
    /// Dry-run mode: timer ticked, remote untouched.
    DryRun,
    /// Today's budget is spent; nothing was attempted.
    QuotaExhausted,
    /// Remote fetch failed; no quota charged, nothing appended.
    FetchFailed,
    /// Fetch succeeded but the append failed; snapshot dropped.
    PersistFailed,
}

pub struct Poller {
    api: Arc<dyn VehicleApi>,
    quota: QuotaTracker,
    log: TelemetryLog,
    metrics: Arc<Metrics>,
    dry_run: bool,
    interval: Duration,
}

impl Poller {
    pub fn new(
        api: Arc<dyn VehicleApi>,
        quota: QuotaTracker,
        log: TelemetryLog,
        metrics: Arc<Metrics>,
        dry_run: bool,
        interval: Duration,
    ) -> Self {
        Poller {
            api,
            quota,
            log,
            metrics,
            dry_run,
            interval,
        }
    }

    /// One scheduling decision: permission, fetch, charge, append.
    pub async fn tick(&mut self) -> TickOutcome {
        if !self.quota.can_call() {
            let state = self.quota.state();
            warn!(
                calls_made = state.calls_made,
                daily_limit = state.daily_limit,
                "skipping tick: quota exhausted for today"
            );
            self.metrics.quota_skips_total.inc();
            return TickOutcome::QuotaExhausted;
        }

        if self.dry_run {
            debug!("dry run: skipping remote call");
            return TickOutcome::DryRun;
        }

        let snapshot = match self.api.fetch_status().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "remote fetch failed; no quota charged");
                self.metrics.poll_failures_total.inc();
                return TickOutcome::FetchFailed;
            }
        };

        // the call happened, so charge it even if the charge cannot be
        // persisted; a persist failure only risks under-counting
        if let Err(e) = self.quota.record_call() {
            warn!(error = %e, "failed to persist quota state");
        }

        if let Err(e) = self.log.append(&snapshot) {
            // drop the snapshot rather than risk corrupting the log
            error!(error = %e, "failed to append snapshot; dropping it");
            self.metrics.persist_failures_total.inc();
            return TickOutcome::PersistFailed;
        }

        self.metrics.observe_snapshot(&snapshot);
        self.metrics.polls_total.inc();
        info!(
            charge_percent = snapshot.charge_percent,
            odometer = snapshot.odometer,
            range_estimate = snapshot.range_estimate,
            calls_made = self.quota.state().calls_made,
            "recorded snapshot"
        );

        TickOutcome::Fetched
    }

    /// Run the timer loop until `shutdown` flips. The first tick fires
    /// immediately; an in-flight tick finishes before the loop exits.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "poll scheduler started");

        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.tick().await;
                }
                _ = shutdown.changed() => {
                    info!("poll scheduler shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{FetchError, VehicleApi, VehicleSnapshot};
    use crate::quota::{Clock, QuotaTracker};
    use async_trait::async_trait;
    use chrono::{DateTime, Local, TimeZone, Utc};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FixedClock(DateTime<Local>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Local> {
            self.0
        }
    }

    fn fixed_clock() -> Arc<FixedClock> {
        Arc::new(FixedClock(
            Local.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap(),
        ))
    }

    fn snapshot() -> VehicleSnapshot {
        VehicleSnapshot {
            timestamp: Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap(),
            charge_percent: 72.0,
            odometer: 31_337.0,
            battery_health_percent: 97.0,
            range_estimate: 210.0,
            latitude: 59.33,
            longitude: 18.07,
        }
    }

    /// Scripted stand-in for the remote API; counts how often it was hit.
    struct ScriptedApi {
        responses: Mutex<VecDeque<Result<VehicleSnapshot, FetchError>>>,
        calls: AtomicU32,
    }

    impl ScriptedApi {
        fn always_ok() -> Arc<Self> {
            Arc::new(ScriptedApi {
                responses: Mutex::new(VecDeque::new()),
                calls: AtomicU32::new(0),
            })
        }

        fn scripted(responses: Vec<Result<VehicleSnapshot, FetchError>>) -> Arc<Self> {
            Arc::new(ScriptedApi {
                responses: Mutex::new(responses.into()),
                calls: AtomicU32::new(0),
            })
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl VehicleApi for ScriptedApi {
        async fn fetch_status(&self) -> Result<VehicleSnapshot, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(snapshot()))
        }
    }

    fn poller_in(dir: &TempDir, api: Arc<ScriptedApi>, limit: u32, dry_run: bool) -> Poller {
        let quota = QuotaTracker::open(dir.path().join("quota.json"), limit, fixed_clock());
        let log = TelemetryLog::new(dir.path().join("vehicle_data.csv"));
        let metrics = Arc::new(Metrics::new().unwrap());
        Poller::new(api, quota, log, metrics, dry_run, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn thirty_ticks_fill_the_budget_and_the_next_is_skipped() {
        let dir = TempDir::new().unwrap();
        let api = ScriptedApi::always_ok();
        let mut poller = poller_in(&dir, api.clone(), 30, false);

        for _ in 0..30 {
            assert_eq!(poller.tick().await, TickOutcome::Fetched);
        }
        assert_eq!(poller.tick().await, TickOutcome::QuotaExhausted);

        assert_eq!(api.call_count(), 30);
        assert_eq!(poller.log.read_all().unwrap().len(), 30);
    }

    #[tokio::test]
    async fn failed_fetch_charges_no_quota_and_appends_nothing() {
        let dir = TempDir::new().unwrap();
        let api = ScriptedApi::scripted(vec![
            Err(FetchError::RateLimited),
            Err(FetchError::Auth("401".into())),
            Ok(snapshot()),
        ]);
        let mut poller = poller_in(&dir, api, 5, false);

        assert_eq!(poller.tick().await, TickOutcome::FetchFailed);
        assert_eq!(poller.tick().await, TickOutcome::FetchFailed);
        assert_eq!(poller.quota.state().calls_made, 0);
        assert!(poller.log.read_all().unwrap().is_empty());

        assert_eq!(poller.tick().await, TickOutcome::Fetched);
        assert_eq!(poller.quota.state().calls_made, 1);
        assert_eq!(poller.log.read_all().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dry_run_ticks_consume_nothing() {
        let dir = TempDir::new().unwrap();
        let api = ScriptedApi::always_ok();
        let mut poller = poller_in(&dir, api.clone(), 5, true);

        for _ in 0..50 {
            assert_eq!(poller.tick().await, TickOutcome::DryRun);
        }

        assert_eq!(api.call_count(), 0);
        assert_eq!(poller.quota.state().calls_made, 0);
        assert!(poller.log.read_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_loop_exits_on_shutdown_signal() {
        let dir = TempDir::new().unwrap();
        let api = ScriptedApi::always_ok();
        let poller = poller_in(&dir, api, 5, true);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(poller.run(shutdown_rx));

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler did not stop in time")
            .unwrap();
    }
}
