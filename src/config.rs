use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::cli::Cli;

const SECONDS_PER_DAY: u64 = 86_400;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("daily limit must be at least 1, got {0}")]
    InvalidDailyLimit(u32),

    #[error("cannot resolve bind host {host:?}: {source}")]
    InvalidHost {
        host: String,
        source: std::io::Error,
    },

    #[error("bind host {0:?} resolved to no addresses")]
    UnresolvableHost(String),
}

/// Credentials for the remote vehicle API. Opaque to everything but the client.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub pin: String,
}

#[derive(Debug)]
pub struct Config {
    pub credentials: Credentials,
    pub region: String,
    pub brand: String,
    pub vehicle_id: String,
    pub api_base_url: String,
    pub daily_limit: u32,
    pub min_interval: Duration,
    pub dry_run: bool,
    pub no_poll: bool,
    pub bind: SocketAddr,
    pub log_path: PathBuf,
    pub quota_path: PathBuf,
    pub shutdown_timeout: Duration,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        if cli.daily_limit == 0 {
            return Err(ConfigError::InvalidDailyLimit(cli.daily_limit));
        }

        // hostnames like "localhost" are allowed, not just IP literals
        let bind = (cli.host.as_str(), cli.port)
            .to_socket_addrs()
            .map_err(|source| ConfigError::InvalidHost {
                host: cli.host.clone(),
                source,
            })?
            .next()
            .ok_or_else(|| ConfigError::UnresolvableHost(cli.host.clone()))?;

        // quota state lives next to the log unless placed explicitly
        let quota_path = cli
            .quota_path
            .unwrap_or_else(|| cli.log_path.with_file_name("quota.json"));

        Ok(Config {
            credentials: Credentials {
                username: cli.username,
                password: cli.password,
                pin: cli.pin,
            },
            region: cli.region,
            brand: cli.brand,
            vehicle_id: cli.vehicle_id,
            api_base_url: cli.api_base_url,
            daily_limit: cli.daily_limit,
            min_interval: Duration::from_secs(cli.min_interval_secs),
            dry_run: cli.dry_run,
            no_poll: cli.no_poll,
            bind,
            log_path: cli.log_path,
            quota_path,
            shutdown_timeout: Duration::from_secs(cli.shutdown_timeout_secs),
        })
    }

    /// Interval between scheduler ticks: the day spread evenly over the call
    /// budget, floored so a huge limit cannot produce sub-minute polling.
    pub fn poll_interval(&self) -> Duration {
        let spread = Duration::from_secs(SECONDS_PER_DAY / u64::from(self.daily_limit));
        spread.max(self.min_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(extra: &[&str]) -> Cli {
        let mut args = vec![
            "evwatch",
            "--username", "u",
            "--password", "p",
            "--pin", "1234",
            "--region", "1",
            "--brand", "2",
            "--vehicle-id", "veh-1",
        ];
        args.extend_from_slice(extra);
        Cli::parse_from(args)
    }

    #[test]
    fn interval_spreads_budget_over_the_day() {
        let config = Config::from_cli(cli(&["--daily-limit", "30"])).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(2880));
    }

    #[test]
    fn interval_floor_applies_for_large_limits() {
        let config = Config::from_cli(cli(&["--daily-limit", "100000"])).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(60));
    }

    #[test]
    fn zero_daily_limit_is_rejected() {
        let err = Config::from_cli(cli(&["--daily-limit", "0"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDailyLimit(0)));
    }

    #[test]
    fn hostname_bind_host_is_resolved() {
        let config =
            Config::from_cli(cli(&["--host", "localhost", "--port", "9000"])).unwrap();
        assert!(config.bind.ip().is_loopback());
        assert_eq!(config.bind.port(), 9000);
    }

    #[test]
    fn ip_literal_bind_host_still_works() {
        let config = Config::from_cli(cli(&["--host", "0.0.0.0"])).unwrap();
        assert_eq!(config.bind.to_string(), "0.0.0.0:8001");
    }

    #[test]
    fn quota_path_defaults_next_to_log() {
        let config = Config::from_cli(cli(&["--log-path", "/var/lib/evwatch/data.csv"])).unwrap();
        assert_eq!(
            config.quota_path,
            PathBuf::from("/var/lib/evwatch/quota.json")
        );
    }
}
