//! Remote vehicle API boundary.
//!
//! Everything upstream of the scheduler goes through the [`VehicleApi`]
//! trait so the poll loop can be driven against a fake in tests. The real
//! implementation lives in [`bluelink`].

pub mod bluelink;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One point-in-time reading of vehicle telemetry. Immutable once created;
/// appended to the CSV log and never touched again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub timestamp: DateTime<Utc>,
    pub charge_percent: f64,
    pub odometer: f64,
    pub battery_health_percent: f64,
    pub range_estimate: f64,
    pub latitude: f64,
    pub longitude: f64,
}

/// Why a remote fetch failed. None of these are fatal to the process; the
/// scheduler logs them and keeps ticking.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("remote API rejected credentials: {0}")]
    Auth(String),

    #[error("rate limited by remote API")]
    RateLimited,

    #[error("network error talking to remote API: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed response from remote API: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait VehicleApi: Send + Sync {
    /// Fetch one snapshot of current vehicle state.
    async fn fetch_status(&self) -> Result<VehicleSnapshot, FetchError>;
}
