//! Subset of the Open-Meteo `/v1/forecast` response used for hourly irradiance.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Hourly variables requested from Open-Meteo, in request order.
pub const HOURLY_VARIABLES: &str =
    "shortwave_radiation,direct_radiation,diffuse_radiation,cloudcover,temperature_2m";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ForecastResponse {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
    #[serde(default)]
    pub hourly: HourlySeries,
}

/// Series are kept as raw JSON values: Open-Meteo emits `null` for hours it
/// has no data for, and those samples must be skipped rather than rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HourlySeries {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub shortwave_radiation: Option<Vec<Value>>,
    #[serde(default)]
    pub direct_radiation: Option<Vec<Value>>,
    #[serde(default)]
    pub diffuse_radiation: Option<Vec<Value>>,
    #[serde(default)]
    pub cloudcover: Option<Vec<Value>>,
    #[serde(default)]
    pub temperature_2m: Option<Vec<Value>>,
}
