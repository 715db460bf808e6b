//! Diesel row structs for the `raw` and `mart` schemas.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel::sql_types::{Float8, Nullable, Text};
use serde::Serialize;

use crate::schema;

/// Values stored in `raw.solar_obs.source`.
pub mod obs_source {
    pub const OPEN_METEO: &str = "OPEN_METEO";
    pub const FALLBACK: &str = "FALLBACK";
    pub const SYNTHETIC: &str = "SYNTHETIC";
}

/// Values stored in `mart.forecast.method`.
pub mod forecast_method {
    pub const MOVING_AVERAGE_7D: &str = "7D_MA";
}

pub const FALLBACK_TEMP_C: f64 = 20.0;

#[derive(Debug, Clone, PartialEq, Insertable, Serialize)]
#[diesel(table_name = schema::solar_obs)]
pub struct NewObservation {
    pub obs_date: NaiveDate,
    pub zip: String,
    pub ghi: f64,
    pub dni: f64,
    pub dhi: f64,
    pub cloud_cover: f64,
    pub temp_c: f64,
    pub source: String,
}

impl NewObservation {
    /// Record used when geocoding or the weather fetch fails.
    pub fn fallback(obs_date: NaiveDate, zip: &str) -> Self {
        Self {
            obs_date,
            zip: zip.trim().to_string(),
            ghi: 0.0,
            dni: 0.0,
            dhi: 0.0,
            cloud_cover: 0.0,
            temp_c: FALLBACK_TEMP_C,
            source: obs_source::FALLBACK.to_string(),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = schema::summaries)]
pub struct Summary {
    pub zip: String,
    pub summary_text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = schema::summaries)]
pub struct NewSummary {
    pub summary_date: NaiveDate,
    pub zip: String,
    pub summary_text: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = schema::forecast)]
pub struct ForecastEntry {
    pub forecast_date: NaiveDate,
    pub predicted_ghi: f64,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = schema::forecast)]
pub struct NewForecastEntry {
    pub zip: String,
    pub forecast_date: NaiveDate,
    pub predicted_ghi: f64,
    pub method: String,
}

/// One row of the today-vs-30-day aggregate. Either side may be absent.
#[derive(Debug, Clone, Default, PartialEq, QueryableByName)]
pub struct TodayVsBaseline {
    #[diesel(sql_type = Text)]
    pub zip: String,
    #[diesel(sql_type = Nullable<Float8>)]
    pub ghi_today: Option<f64>,
    #[diesel(sql_type = Nullable<Float8>)]
    pub dni_today: Option<f64>,
    #[diesel(sql_type = Nullable<Float8>)]
    pub dhi_today: Option<f64>,
    #[diesel(sql_type = Nullable<Float8>)]
    pub cloud_today: Option<f64>,
    #[diesel(sql_type = Nullable<Float8>)]
    pub ghi_30d: Option<f64>,
    #[diesel(sql_type = Nullable<Float8>)]
    pub dni_30d: Option<f64>,
    #[diesel(sql_type = Nullable<Float8>)]
    pub dhi_30d: Option<f64>,
    #[diesel(sql_type = Nullable<Float8>)]
    pub cloud_30d: Option<f64>,
}
