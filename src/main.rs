use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use evwatch::api::bluelink::BluelinkClient;
use evwatch::cli::Cli;
use evwatch::config::Config;
use evwatch::poll::Poller;
use evwatch::quota::{QuotaTracker, SystemClock};
use evwatch::serve::metrics::Metrics;
use evwatch::serve::{self, AppState};
use evwatch::store::TelemetryLog;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolve on SIGINT or SIGTERM.
async fn termination_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_cli(cli).context("invalid configuration")?;

    let metrics = Arc::new(Metrics::new().context("failed to build metrics registry")?);
    let log = TelemetryLog::new(config.log_path.clone());

    metrics.prime_from_log(&log);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let poller_handle = if config.no_poll {
        info!("polling disabled (--no-poll); serving existing data only");
        None
    } else {
        let api = Arc::new(
            BluelinkClient::new(&config).context("failed to build remote API client")?,
        );
        let quota = QuotaTracker::open(
            config.quota_path.clone(),
            config.daily_limit,
            Arc::new(SystemClock),
        );
        let poller = Poller::new(
            api,
            quota,
            log.clone(),
            metrics.clone(),
            config.dry_run,
            config.poll_interval(),
        );
        if config.dry_run {
            info!("dry run enabled: scheduler ticks without remote calls");
        }
        Some(tokio::spawn(poller.run(shutdown_rx.clone())))
    };

    let state = Arc::new(AppState {
        log,
        metrics,
    });

    // flip the shutdown flag on the first termination signal
    tokio::spawn(async move {
        termination_signal().await;
        info!("termination signal received, shutting down");
        let _ = shutdown_tx.send(true);
    });

    serve::serve(config.bind, state, shutdown_rx).await?;

    // bounded wait for the scheduler to finish an in-flight tick
    if let Some(handle) = poller_handle {
        if tokio::time::timeout(config.shutdown_timeout, handle)
            .await
            .is_err()
        {
            warn!(
                timeout_secs = config.shutdown_timeout.as_secs(),
                "poll scheduler did not stop in time, abandoning it"
            );
        }
    }

    info!("shutdown complete");
    Ok(())
}
