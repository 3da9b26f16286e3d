//! Prometheus metrics.
//!
//! Gauges mirror the latest snapshot; counters track poll outcomes. All
//! metrics live in one owned registry so tests can build isolated
//! instances instead of fighting over a process-global default.

use prometheus::{Encoder, Gauge, IntCounter, Registry, TextEncoder};
use tracing::{info, warn};

use crate::api::VehicleSnapshot;
use crate::store::TelemetryLog;

pub struct Metrics {
    registry: Registry,
    pub charge_percent: Gauge,
    pub odometer: Gauge,
    pub battery_health_percent: Gauge,
    pub range_estimate: Gauge,
    pub polls_total: IntCounter,
    pub poll_failures_total: IntCounter,
    pub quota_skips_total: IntCounter,
    pub persist_failures_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // gauge names kept from the original exporter so dashboards survive
        let charge_percent = Gauge::new("vehicle_data_charging_level", "Charging level")?;
        let odometer = Gauge::new("vehicle_data_mileage", "Mileage")?;
        let battery_health_percent =
            Gauge::new("vehicle_data_battery_health", "Battery health percentage")?;
        let range_estimate =
            Gauge::new("vehicle_data_ev_driving_range", "Estimated driving range")?;

        let polls_total =
            IntCounter::new("evwatch_polls_total", "Successful polls recorded")?;
        let poll_failures_total =
            IntCounter::new("evwatch_poll_failures_total", "Remote fetches that failed")?;
        let quota_skips_total = IntCounter::new(
            "evwatch_quota_skips_total",
            "Ticks skipped because the daily quota was exhausted",
        )?;
        let persist_failures_total = IntCounter::new(
            "evwatch_persist_failures_total",
            "Snapshots dropped because the log append failed",
        )?;

        registry.register(Box::new(charge_percent.clone()))?;
        registry.register(Box::new(odometer.clone()))?;
        registry.register(Box::new(battery_health_percent.clone()))?;
        registry.register(Box::new(range_estimate.clone()))?;
        registry.register(Box::new(polls_total.clone()))?;
        registry.register(Box::new(poll_failures_total.clone()))?;
        registry.register(Box::new(quota_skips_total.clone()))?;
        registry.register(Box::new(persist_failures_total.clone()))?;

        Ok(Metrics {
            registry,
            charge_percent,
            odometer,
            battery_health_percent,
            range_estimate,
            polls_total,
            poll_failures_total,
            quota_skips_total,
            persist_failures_total,
        })
    }

    /// Point the gauges at a snapshot's values.
    pub fn observe_snapshot(&self, snapshot: &VehicleSnapshot) {
        self.charge_percent.set(snapshot.charge_percent);
        self.odometer.set(snapshot.odometer);
        self.battery_health_percent.set(snapshot.battery_health_percent);
        self.range_estimate.set(snapshot.range_estimate);
    }

    /// Point the gauges at the newest persisted record so /metrics is
    /// meaningful before the first poll of this process. A missing or
    /// unreadable log leaves the gauges at their defaults.
    pub fn prime_from_log(&self, log: &TelemetryLog) {
        match log.latest() {
            Ok(Some(last)) => {
                info!(timestamp = %last.timestamp, "primed metrics from persisted log");
                self.observe_snapshot(&last);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "could not prime metrics from log"),
        }
    }

    /// Text exposition of everything in the registry.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
