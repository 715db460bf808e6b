use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::{AppState, resolve_zip, with_conn};
use crate::db::models::ForecastEntry;
use crate::error::ApiResult;
use crate::schema;
use crate::utils::{FORECAST_DEFAULT_DAYS, FORECAST_MAX_DAYS, FORECAST_MIN_DAYS, clamp_days, today_utc};

#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    pub zip: Option<String>,
    pub days: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ForecastPoint {
    #[serde(rename = "FORECAST_DATE")]
    pub forecast_date: NaiveDate,
    #[serde(rename = "PREDICTED_GHI")]
    pub predicted_ghi: f64,
}

impl From<ForecastEntry> for ForecastPoint {
    fn from(e: ForecastEntry) -> Self {
        Self {
            forecast_date: e.forecast_date,
            predicted_ghi: e.predicted_ghi,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ForecastResponse {
    pub zip: String,
    pub days: i64,
    pub series: Vec<ForecastPoint>,
}

/// GET /forecast?zip&days - upcoming predicted GHI, strictly after today
async fn upcoming(
    State(state): State<AppState>,
    query: Result<Query<ForecastQuery>, QueryRejection>,
) -> ApiResult<Json<ForecastResponse>> {
    let Query(q) = query?;
    let zip = resolve_zip(&state.config.zips, q.zip.as_deref())?;
    let days = clamp_days(q.days.as_deref(), FORECAST_DEFAULT_DAYS, FORECAST_MIN_DAYS, FORECAST_MAX_DAYS);
    let today = today_utc();

    let query_zip = zip.clone();
    let entries = with_conn(&state, move |conn| {
        use schema::forecast::dsl as F;

        Ok(F::forecast
            .filter(F::zip.eq(query_zip))
            .filter(F::forecast_date.gt(today))
            .order(F::forecast_date)
            .limit(days)
            .select(ForecastEntry::as_select())
            .load(conn)?)
    })
    .await?;

    Ok(Json(ForecastResponse {
        zip,
        days,
        series: entries.into_iter().map(ForecastPoint::from).collect(),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/forecast", get(upcoming))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_uses_upper_case_keys() {
        let resp = ForecastResponse {
            zip: "93727".into(),
            days: 1,
            series: vec![ForecastPoint::from(ForecastEntry {
                forecast_date: NaiveDate::from_ymd_opt(2025, 10, 16).unwrap(),
                predicted_ghi: 212.25,
            })],
        };
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            serde_json::json!({
                "zip": "93727",
                "days": 1,
                "series": [{"FORECAST_DATE": "2025-10-16", "PREDICTED_GHI": 212.25}]
            })
        );
    }
}
