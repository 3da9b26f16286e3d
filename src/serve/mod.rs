//! HTTP query/serve layer.
//!
//! Stateless, read-only handlers over the telemetry log:
//! - `/metrics`: Prometheus text exposition
//! - `/charge.png`, `/mileage.png`, `/range.png`: rendered plots
//! - `/map`: Leaflet page with the location history
//!
//! Handlers read the log on demand and never mutate anything, so they need
//! no coordination with the scheduler beyond the log's append-only
//! guarantee.

pub mod map;
pub mod metrics;
pub mod plot;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info};

use crate::serve::metrics::Metrics;
use crate::serve::plot::{PlotError, PlotSeries};
use crate::store::TelemetryLog;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("http server error: {0}")]
    Serve(#[source] std::io::Error),
}

pub struct AppState {
    pub log: TelemetryLog,
    pub metrics: Arc<Metrics>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_text))
        .route("/map", get(map_page))
        .route("/charge.png", get(charge_png))
        .route("/mileage.png", get(mileage_png))
        .route("/range.png", get(range_png))
        .with_state(state)
}

/// Bind and serve until `shutdown` flips.
pub async fn serve(
    addr: SocketAddr,
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ServeError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })?;

    info!(%addr, "http server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await
        .map_err(ServeError::Serve)
}

async fn metrics_text(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable").into_response()
        }
    }
}

async fn map_page(State(state): State<Arc<AppState>>) -> Response {
    let snapshots = match state.log.read_all() {
        Ok(snapshots) => snapshots,
        Err(e) => {
            error!(error = %e, "failed to read telemetry log");
            return (StatusCode::INTERNAL_SERVER_ERROR, "log unreadable").into_response();
        }
    };

    match map::render_map(&snapshots) {
        Some(html) => Html(html).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "no telemetry recorded yet").into_response(),
    }
}

async fn charge_png(state: State<Arc<AppState>>) -> Response {
    plot_response(state, PlotSeries::Charge).await
}

async fn mileage_png(state: State<Arc<AppState>>) -> Response {
    plot_response(state, PlotSeries::Mileage).await
}

async fn range_png(state: State<Arc<AppState>>) -> Response {
    plot_response(state, PlotSeries::Range).await
}

async fn plot_response(State(state): State<Arc<AppState>>, series: PlotSeries) -> Response {
    let snapshots = match state.log.read_all() {
        Ok(snapshots) => snapshots,
        Err(e) => {
            error!(error = %e, "failed to read telemetry log");
            return (StatusCode::INTERNAL_SERVER_ERROR, "log unreadable").into_response();
        }
    };

    // rendering rasterizes a full chart; keep it off the async workers
    let rendered =
        tokio::task::spawn_blocking(move || plot::render_png(&snapshots, series)).await;

    match rendered {
        Ok(Ok(png)) => ([(header::CONTENT_TYPE, "image/png")], png).into_response(),
        Ok(Err(PlotError::NoData)) => {
            (StatusCode::SERVICE_UNAVAILABLE, "no telemetry recorded yet").into_response()
        }
        Ok(Err(e)) => {
            error!(error = %e, "failed to render plot");
            (StatusCode::INTERNAL_SERVER_ERROR, "plot rendering failed").into_response()
        }
        Err(e) => {
            error!(error = %e, "plot rendering task panicked");
            (StatusCode::INTERNAL_SERVER_ERROR, "plot rendering failed").into_response()
        }
    }
}
