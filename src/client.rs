//! Blocking HTTP client for the public upstream APIs.
//!
//! - `ureq` agent with per-request timeouts, no retries.
//! - Geocoding via zippopotam.us (ZIP -> lat/lon, no API key).
//! - Hourly irradiance via Open-Meteo (no API key), reduced to last-24h means.
//! - A generic JSON POST used by the narrative service.

use http::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::models::open_meteo::{ForecastResponse, HOURLY_VARIABLES};
use crate::models::zippopotam::ZipLookup;

const GEOCODE_BASE_URL: &str = "https://api.zippopotam.us/us";
const OPEN_METEO_URL: &str = "https://api.open-meteo.com/v1/forecast";

pub const GEOCODE_TIMEOUT: Duration = Duration::from_secs(20);
pub const WEATHER_TIMEOUT: Duration = Duration::from_secs(30);

/// Samples averaged per metric: the most recent day of hourly data.
pub const WINDOW_HOURS: usize = 24;

#[derive(Debug)]
pub enum ClientError {
    Transport(String),
    Http { status: u16, message: String },
    Json { path: String, message: String },
    MissingData(String),
    InvalidData(String),
}

impl core::fmt::Display for ClientError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ClientError::Transport(s) => write!(f, "transport error: {}", s),
            ClientError::Http { status, message } => write!(f, "http {}: {}", status, message),
            ClientError::Json { path, message } => write!(f, "json error at {}: {}", path, message),
            ClientError::MissingData(s) => write!(f, "missing data: {}", s),
            ClientError::InvalidData(s) => write!(f, "invalid data: {}", s),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<ureq::Error> for ClientError {
    fn from(value: ureq::Error) -> Self {
        ClientError::Transport(value.to_string())
    }
}

/// Mean irradiance/cloud/temperature over the most recent 24 hourly samples.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RecentMeans {
    pub ghi: f64,
    pub dni: f64,
    pub dhi: f64,
    pub cloud_cover: f64,
    pub temp_c: f64,
}

pub struct ApiClient {
    agent: ureq::Agent,
}

impl Default for ApiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiClient {
    pub fn new() -> Self {
        // Status codes are inspected by hand so error bodies can be reported.
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();
        ApiClient { agent }
    }

    pub fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> Result<T, ClientError> {
        let mut req = self.agent.get(url).header("Accept", "application/json");
        for (k, v) in query {
            req = req.query(*k, v);
        }
        let resp = req.config().timeout_global(Some(timeout)).build().call()?;
        Self::read_json(resp)
    }

    pub fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &B,
        timeout: Duration,
    ) -> Result<T, ClientError> {
        let mut req = self.agent.post(url).header("Accept", "application/json");
        for (k, v) in headers {
            req = req.header(*k, *v);
        }
        let resp = req.config().timeout_global(Some(timeout)).build().send_json(body)?;
        Self::read_json(resp)
    }

    fn read_json<T: DeserializeOwned>(mut resp: http::Response<ureq::Body>) -> Result<T, ClientError> {
        let status = resp.status();
        let body = resp.body_mut().read_to_string()?;
        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                message: truncate_body(status, &body),
            });
        }
        decode_json(&body)
    }

    /// Resolve a US ZIP code to the coordinates of its first listed place.
    pub fn zip_to_latlon(&self, zip: &str) -> Result<(f64, f64), ClientError> {
        let url = format!("{}/{}", GEOCODE_BASE_URL, zip.trim());
        let lookup: ZipLookup = self.get_json(&url, &[], GEOCODE_TIMEOUT)?;
        coordinates_of(zip, &lookup)
    }

    /// Fetch yesterday+today hourly data and average the most recent 24 hours.
    ///
    /// Working from the tail of the series sidesteps any local/UTC date
    /// mismatch between the caller and the forecast grid.
    pub fn recent_means(&self, lat: f64, lon: f64) -> Result<RecentMeans, ClientError> {
        let query = [
            ("latitude", lat.to_string()),
            ("longitude", lon.to_string()),
            ("hourly", HOURLY_VARIABLES.to_string()),
            ("past_days", "1".to_string()),
            ("forecast_days", "1".to_string()),
            ("timezone", "UTC".to_string()),
        ];
        let resp: ForecastResponse = self.get_json(OPEN_METEO_URL, &query, WEATHER_TIMEOUT)?;
        Ok(means_from_response(&resp))
    }
}

fn truncate_body(status: StatusCode, body: &str) -> String {
    const LIMIT: usize = 512;
    if body.trim().is_empty() {
        return status.canonical_reason().unwrap_or("<no body>").to_string();
    }
    match body.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

pub fn decode_json<T: DeserializeOwned>(body: &str) -> Result<T, ClientError> {
    let de = &mut serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(de).map_err(|e| ClientError::Json {
        path: e.path().to_string(),
        message: e.inner().to_string(),
    })
}

pub fn coordinates_of(zip: &str, lookup: &ZipLookup) -> Result<(f64, f64), ClientError> {
    let place = lookup
        .places
        .first()
        .ok_or_else(|| ClientError::MissingData(format!("no geocode for ZIP {}", zip.trim())))?;
    let lat = place
        .latitude
        .trim()
        .parse::<f64>()
        .map_err(|_| ClientError::MissingData(format!("bad latitude {:?} for ZIP {}", place.latitude, zip.trim())))?;
    let lon = place
        .longitude
        .trim()
        .parse::<f64>()
        .map_err(|_| ClientError::MissingData(format!("bad longitude {:?} for ZIP {}", place.longitude, zip.trim())))?;
    Ok((lat, lon))
}

pub fn means_from_response(resp: &ForecastResponse) -> RecentMeans {
    let h = &resp.hourly;
    RecentMeans {
        ghi: mean_last_24(h.shortwave_radiation.as_deref()),
        dni: mean_last_24(h.direct_radiation.as_deref()),
        dhi: mean_last_24(h.diffuse_radiation.as_deref()),
        cloud_cover: mean_last_24(h.cloudcover.as_deref()),
        temp_c: mean_last_24(h.temperature_2m.as_deref()),
    }
}

/// Mean of the last (up to) 24 numeric samples; non-numbers are dropped
/// before the window is taken. No numeric samples yields 0.
pub fn mean_last_24(values: Option<&[Value]>) -> f64 {
    let numeric: Vec<f64> = values
        .unwrap_or(&[])
        .iter()
        .filter_map(Value::as_f64)
        .collect();
    if numeric.is_empty() {
        return 0.0;
    }
    let take = numeric.len().min(WINDOW_HOURS);
    let tail = &numeric[numeric.len() - take..];
    tail.iter().sum::<f64>() / tail.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::zippopotam::Place;
    use serde_json::json;

    fn load_fixture() -> ForecastResponse {
        let json = std::fs::read_to_string("tests/data/open-meteo-hourly.json").expect("fixture present");
        decode_json(&json).expect("parse open-meteo response")
    }

    #[test]
    fn mean_uses_all_samples_when_fewer_than_window() {
        let values = vec![json!(10.0), json!(20.0), json!(30.0)];
        assert_eq!(mean_last_24(Some(values.as_slice())), 20.0);
    }

    #[test]
    fn mean_takes_only_most_recent_window() {
        // 24 zeros followed by 24 hundreds: only the tail counts
        let mut values: Vec<Value> = (0..24).map(|_| json!(0)).collect();
        values.extend((0..24).map(|_| json!(100)));
        assert_eq!(mean_last_24(Some(values.as_slice())), 100.0);
    }

    #[test]
    fn mean_skips_non_numeric_samples() {
        let values = vec![json!(null), json!(4.0), json!("n/a"), json!(8), json!(true)];
        assert_eq!(mean_last_24(Some(values.as_slice())), 6.0);
    }

    #[test]
    fn mean_without_numbers_is_zero() {
        assert_eq!(mean_last_24(None), 0.0);
        assert_eq!(mean_last_24(Some(&[][..])), 0.0);
        assert_eq!(mean_last_24(Some(&[json!(null), json!(null)][..])), 0.0);
    }

    #[test]
    fn fixture_means_ignore_trailing_nulls() {
        let resp = load_fixture();
        let means = means_from_response(&resp);
        // last 24 numeric GHI values in the fixture sum to 4800
        assert!((means.ghi - 200.0).abs() < 1e-9);
        assert!((means.cloud_cover - 25.0).abs() < 1e-9);
        assert!((means.temp_c - 18.5).abs() < 1e-9);
        // series missing from the payload average to zero
        assert_eq!(means.dhi, 0.0);
    }

    #[test]
    fn json_errors_report_the_failing_path() {
        let err = decode_json::<ZipLookup>(r#"{"places":[{"latitude":1.5,"longitude":"2"}]}"#).unwrap_err();
        match err {
            ClientError::Json { path, .. } => assert_eq!(path, "places[0].latitude"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn coordinates_come_from_first_place() {
        let lookup = ZipLookup {
            places: vec![
                Place {
                    latitude: " 36.7477 ".into(),
                    longitude: "-119.7724".into(),
                    ..Default::default()
                },
                Place {
                    latitude: "0".into(),
                    longitude: "0".into(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(coordinates_of("93727", &lookup).unwrap(), (36.7477, -119.7724));
    }

    #[test]
    fn empty_places_is_missing_data() {
        let err = coordinates_of("00000", &ZipLookup::default()).unwrap_err();
        assert!(matches!(err, ClientError::MissingData(_)));
        assert!(err.to_string().contains("00000"));
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(2000);
        let msg = truncate_body(StatusCode::BAD_GATEWAY, &body);
        assert_eq!(msg.len(), 515);
        assert_eq!(truncate_body(StatusCode::BAD_GATEWAY, "  "), "Bad Gateway");
    }
}
