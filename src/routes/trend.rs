use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Duration, NaiveDate};
use diesel::dsl::avg;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::{AppState, resolve_zip, with_conn};
use crate::error::{ApiError, ApiResult};
use crate::schema;
use crate::utils::{
    MAX_RANGE_DAYS, TREND_DEFAULT_DAYS, TREND_MAX_DAYS, TREND_MIN_DAYS, clamp_days, normalize_range, parse_iso_date,
    today_utc,
};

/// Raw query parameters; `days` stays a string so junk falls back to the default.
#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    pub zip: Option<String>,
    pub days: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendWindow {
    /// Last `n` dates including today.
    Days(i64),
    /// Inclusive, ordered, at most 60 days.
    Range(NaiveDate, NaiveDate),
}

#[derive(Debug, Serialize)]
pub struct TrendPoint {
    #[serde(rename = "OBS_DATE")]
    pub obs_date: NaiveDate,
    #[serde(rename = "GHI_MEAN")]
    pub ghi_mean: f64,
}

#[derive(Debug, Serialize)]
pub struct TrendResponse {
    pub zip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDate>,
    pub series: Vec<TrendPoint>,
}

/// Explicit start/end wins over `days`; both ends must be valid ISO dates.
pub fn parse_window(q: &TrendQuery) -> ApiResult<TrendWindow> {
    let start = q.start.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let end = q.end.as_deref().map(str::trim).filter(|s| !s.is_empty());
    match (start, end) {
        (None, None) => Ok(TrendWindow::Days(clamp_days(
            q.days.as_deref(),
            TREND_DEFAULT_DAYS,
            TREND_MIN_DAYS,
            TREND_MAX_DAYS,
        ))),
        (Some(s), Some(e)) => {
            let start = parse_iso_date(s)
                .ok_or_else(|| ApiError::BadRequest(format!("start must be an ISO date (YYYY-MM-DD), got {}", s)))?;
            let end = parse_iso_date(e)
                .ok_or_else(|| ApiError::BadRequest(format!("end must be an ISO date (YYYY-MM-DD), got {}", e)))?;
            let (start, end) = normalize_range(start, end, MAX_RANGE_DAYS);
            Ok(TrendWindow::Range(start, end))
        }
        _ => Err(ApiError::BadRequest("start and end must be given together".to_string())),
    }
}

impl TrendWindow {
    pub fn bounds(self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            TrendWindow::Days(n) => (today - Duration::days(n - 1), today),
            TrendWindow::Range(start, end) => (start, end),
        }
    }
}

/// GET /zips - sorted unique allow-list
async fn list_zips(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.config.sorted_zips())
}

/// GET /ghitrend?zip&days | ?zip&start&end - daily mean GHI series
///
/// The ZIP is checked before the window, so a request with both a
/// disallowed ZIP and a bad date reports the ZIP error.
async fn ghi_trend(
    State(state): State<AppState>,
    query: Result<Query<TrendQuery>, QueryRejection>,
) -> ApiResult<Json<TrendResponse>> {
    let Query(q) = query?;
    let zip = resolve_zip(&state.config.zips, q.zip.as_deref())?;
    let window = parse_window(&q)?;
    let (from, to) = window.bounds(today_utc());

    let query_zip = zip.clone();
    let rows: Vec<(NaiveDate, Option<f64>)> = with_conn(&state, move |conn| {
        use schema::solar_obs::dsl as O;

        Ok(O::solar_obs
            .filter(O::zip.eq(query_zip))
            .filter(O::obs_date.between(from, to))
            .group_by(O::obs_date)
            .select((O::obs_date, avg(O::ghi)))
            .order(O::obs_date)
            .load(conn)?)
    })
    .await?;

    let series = rows
        .into_iter()
        .map(|(obs_date, ghi)| TrendPoint {
            obs_date,
            ghi_mean: ghi.unwrap_or(0.0),
        })
        .collect();

    let (days, start, end) = match window {
        TrendWindow::Days(n) => (Some(n), None, None),
        TrendWindow::Range(s, e) => (None, Some(s), Some(e)),
    };
    Ok(Json(TrendResponse {
        zip,
        days,
        start,
        end,
        series,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/zips", get(list_zips))
        .route("/ghitrend", get(ghi_trend))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(days: Option<&str>, start: Option<&str>, end: Option<&str>) -> TrendQuery {
        TrendQuery {
            zip: None,
            days: days.map(String::from),
            start: start.map(String::from),
            end: end.map(String::from),
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn days_window_is_clamped() {
        assert_eq!(parse_window(&query(Some("1"), None, None)).unwrap(), TrendWindow::Days(3));
        assert_eq!(parse_window(&query(Some("1000"), None, None)).unwrap(), TrendWindow::Days(60));
        assert_eq!(parse_window(&query(None, None, None)).unwrap(), TrendWindow::Days(7));
    }

    #[test]
    fn days_window_ends_today() {
        let today = d(2025, 10, 15);
        assert_eq!(TrendWindow::Days(10).bounds(today), (d(2025, 10, 6), today));
    }

    #[test]
    fn explicit_range_overrides_days_and_is_normalized() {
        let w = parse_window(&query(Some("5"), Some("2025-04-01"), Some("2025-01-01"))).unwrap();
        assert_eq!(w, TrendWindow::Range(d(2025, 2, 1), d(2025, 4, 1)));
    }

    #[test]
    fn half_range_is_rejected() {
        let err = parse_window(&query(None, Some("2025-01-01"), None)).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn response_echoes_range_not_days() {
        let resp = TrendResponse {
            zip: "93727".into(),
            days: None,
            start: Some(d(2025, 3, 1)),
            end: Some(d(2025, 3, 2)),
            series: vec![TrendPoint {
                obs_date: d(2025, 3, 1),
                ghi_mean: 180.5,
            }],
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "zip": "93727",
                "start": "2025-03-01",
                "end": "2025-03-02",
                "series": [{"OBS_DATE": "2025-03-01", "GHI_MEAN": 180.5}]
            })
        );
    }
}
