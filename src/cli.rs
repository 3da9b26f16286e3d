use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "evwatch")]
#[command(about = "Rate-limited EV telematics poller and metrics server")]
#[command(version)]
pub struct Cli {
    /// Account username for the remote vehicle API
    #[arg(long, env = "EVWATCH_USERNAME")]
    pub username: String,

    /// Account password for the remote vehicle API
    #[arg(long, env = "EVWATCH_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Account PIN for the remote vehicle API
    #[arg(long, env = "EVWATCH_PIN", hide_env_values = true)]
    pub pin: String,

    /// Region code passed to the remote API
    #[arg(long, env = "EVWATCH_REGION")]
    pub region: String,

    /// Brand code passed to the remote API
    #[arg(long, env = "EVWATCH_BRAND")]
    pub brand: String,

    /// Identifier of the vehicle to poll
    #[arg(long, env = "EVWATCH_VEHICLE_ID")]
    pub vehicle_id: String,

    /// Base URL of the remote vehicle API
    #[arg(long, env = "EVWATCH_API_BASE_URL", default_value = "https://api.bluelink.example")]
    pub api_base_url: String,

    /// Maximum remote API calls per calendar day
    #[arg(long, env = "EVWATCH_DAILY_LIMIT", default_value_t = 30)]
    pub daily_limit: u32,

    /// Lower bound on the poll interval in seconds, regardless of the daily limit
    #[arg(long, env = "EVWATCH_MIN_INTERVAL_SECS", default_value_t = 60)]
    pub min_interval_secs: u64,

    /// Tick the scheduler without calling the remote API or writing data
    #[arg(long, env = "EVWATCH_DRY_RUN", default_value_t = false)]
    pub dry_run: bool,

    /// Serve the collected data without starting the poller at all
    #[arg(long, env = "EVWATCH_NO_POLL", default_value_t = false)]
    pub no_poll: bool,

    /// HTTP bind host
    #[arg(long, env = "EVWATCH_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// HTTP bind port
    #[arg(long, env = "EVWATCH_PORT", default_value_t = 8001)]
    pub port: u16,

    /// Path of the append-only telemetry CSV log
    #[arg(long, env = "EVWATCH_LOG_PATH", default_value = "vehicle_data.csv")]
    pub log_path: PathBuf,

    /// Path of the quota state file (defaults to quota.json next to the log)
    #[arg(long, env = "EVWATCH_QUOTA_PATH")]
    pub quota_path: Option<PathBuf>,

    /// Seconds to wait for an in-flight fetch during shutdown
    #[arg(long, env = "EVWATCH_SHUTDOWN_TIMEOUT_SECS", default_value_t = 30)]
    pub shutdown_timeout_secs: u64,
}
