//! Rate-limited EV telematics poller.
//!
//! Polls a Bluelink-style vehicle API on a schedule derived from a daily
//! call budget, appends each reading to an append-only CSV log, and serves
//! the collected series over HTTP:
//! - `/metrics`: Prometheus gauges for the latest reading
//! - `/charge.png`, `/mileage.png`, `/range.png`: time-series plots
//! - `/map`: location history on a Leaflet map
//!
//! The quota tracker persists across restarts so a crash loop cannot burn
//! through the day's call budget.

pub mod api;
pub mod cli;
pub mod config;
pub mod poll;
pub mod quota;
pub mod serve;
pub mod store;
