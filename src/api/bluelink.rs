//! Bluelink-style HTTP client.
//!
//! Login is a username/password/pin exchange for a short-lived bearer token;
//! status is a single GET per fetch. With a 30-call daily budget there is no
//! value in caching the token across fetches, so each fetch logs in fresh.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::api::{FetchError, VehicleApi, VehicleSnapshot};
use crate::config::{Config, Credentials};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub struct BluelinkClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    region: String,
    brand: String,
    vehicle_id: String,
}

#[derive(Deserialize)]
struct LoginResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    ev_battery_percentage: Option<f64>,
    odometer: Option<f64>,
    // not reported by all model years
    ev_battery_soh_percentage: Option<f64>,
    ev_driving_range: Option<f64>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl BluelinkClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

        Ok(BluelinkClient {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            credentials: config.credentials.clone(),
            region: config.region.clone(),
            brand: config.brand.clone(),
            vehicle_id: config.vehicle_id.clone(),
        })
    }

    async fn login(&self) -> Result<String, FetchError> {
        let response = self
            .http
            .post(format!("{}/v2/login", self.base_url))
            .header("X-Region", &self.region)
            .header("X-Brand", &self.brand)
            .json(&serde_json::json!({
                "username": self.credentials.username,
                "password": self.credentials.password,
                "pin": self.credentials.pin,
            }))
            .send()
            .await?;

        let response = map_status(response)?;
        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Malformed(format!("login response: {e}")))?;

        Ok(login.access_token)
    }
}

#[async_trait]
impl VehicleApi for BluelinkClient {
    async fn fetch_status(&self) -> Result<VehicleSnapshot, FetchError> {
        let token = self.login().await?;
        debug!(vehicle_id = %self.vehicle_id, "fetching vehicle status");

        let response = self
            .http
            .get(format!(
                "{}/v2/vehicles/{}/status",
                self.base_url, self.vehicle_id
            ))
            .bearer_auth(&token)
            .header("X-Region", &self.region)
            .header("X-Brand", &self.brand)
            .send()
            .await?;

        let response = map_status(response)?;
        let status: StatusResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Malformed(format!("status response: {e}")))?;

        Ok(VehicleSnapshot {
            timestamp: Utc::now(),
            charge_percent: require(status.ev_battery_percentage, "ev_battery_percentage")?,
            odometer: require(status.odometer, "odometer")?,
            // absent soh reads as 0, matching how the vendor reports it
            battery_health_percent: status.ev_battery_soh_percentage.unwrap_or(0.0),
            range_estimate: require(status.ev_driving_range, "ev_driving_range")?,
            latitude: require(status.latitude, "latitude")?,
            longitude: require(status.longitude, "longitude")?,
        })
    }
}

fn require(field: Option<f64>, name: &str) -> Result<f64, FetchError> {
    field.ok_or_else(|| FetchError::Malformed(format!("missing field {name}")))
}

/// Translate HTTP status classes into the fetch error taxonomy.
fn map_status(response: reqwest::Response) -> Result<reqwest::Response, FetchError> {
    match response.status() {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(FetchError::Auth(response.status().to_string()))
        }
        StatusCode::TOO_MANY_REQUESTS => Err(FetchError::RateLimited),
        status if status.is_success() => Ok(response),
        status => Err(FetchError::Malformed(format!(
            "unexpected status {status}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_map_to_malformed() {
        let err = require(None, "odometer").unwrap_err();
        assert!(matches!(err, FetchError::Malformed(msg) if msg.contains("odometer")));
    }

    #[test]
    fn status_response_tolerates_absent_soh() {
        let raw = r#"{"ev_battery_percentage": 81.0, "odometer": 12345.6,
                      "ev_driving_range": 240.0, "latitude": 51.5, "longitude": -0.1}"#;
        let status: StatusResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(status.ev_battery_soh_percentage, None);
        assert_eq!(status.ev_battery_percentage, Some(81.0));
    }
}
