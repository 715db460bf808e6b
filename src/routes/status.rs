use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use diesel::dsl::{count_star, max};
use diesel::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::{AppState, with_conn};
use crate::db::models::obs_source;
use crate::error::ApiResult;
use crate::schema;
use crate::services::forecast::HORIZON_DAYS;
use crate::utils::today_utc;

/// Raw warehouse facts the status report is derived from.
#[derive(Debug, Default)]
pub struct StatusSnapshot {
    pub last_obs: Vec<(String, Option<NaiveDate>)>,
    /// (zip, source) for every RAW row dated today.
    pub today_sources: Vec<(String, String)>,
    pub summarized: Vec<String>,
    /// Future forecast rows per ZIP.
    pub forecast_counts: Vec<(String, i64)>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ZipStatus {
    pub zip: String,
    pub last_obs_date: Option<NaiveDate>,
    pub observed_today: bool,
    pub fallback_today: bool,
    pub summarized_today: bool,
    pub forecast_days: i64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct StatusReport {
    pub date: NaiveDate,
    pub ingestion_complete: bool,
    pub summaries_complete: bool,
    pub forecast_complete: bool,
    pub zips: Vec<ZipStatus>,
}

pub fn build_status(zips: &[String], today: NaiveDate, snapshot: StatusSnapshot) -> StatusReport {
    let last_obs: BTreeMap<String, NaiveDate> = snapshot
        .last_obs
        .into_iter()
        .filter_map(|(zip, date)| date.map(|d| (zip, d)))
        .collect();
    let mut observed = BTreeSet::new();
    let mut fallback = BTreeSet::new();
    for (zip, source) in snapshot.today_sources {
        if source == obs_source::FALLBACK {
            fallback.insert(zip);
        } else {
            observed.insert(zip);
        }
    }
    let summarized: BTreeSet<String> = snapshot.summarized.into_iter().collect();
    let forecast_counts: BTreeMap<String, i64> = snapshot.forecast_counts.into_iter().collect();

    let rows: Vec<ZipStatus> = zips
        .iter()
        .map(|zip| ZipStatus {
            zip: zip.clone(),
            last_obs_date: last_obs.get(zip).copied(),
            observed_today: observed.contains(zip),
            fallback_today: fallback.contains(zip),
            summarized_today: summarized.contains(zip),
            forecast_days: forecast_counts.get(zip).copied().unwrap_or(0),
        })
        .collect();

    // an empty allow-list is never "complete"
    let all = |f: fn(&ZipStatus) -> bool| !rows.is_empty() && rows.iter().all(f);
    StatusReport {
        date: today,
        ingestion_complete: all(|z| z.observed_today || z.fallback_today),
        summaries_complete: all(|z| z.summarized_today),
        forecast_complete: all(|z| z.forecast_days >= HORIZON_DAYS),
        zips: rows,
    }
}

fn load_snapshot(conn: &mut PgConnection, zips: Vec<String>, today: NaiveDate) -> QueryResult<StatusSnapshot> {
    use schema::forecast::dsl as F;
    use schema::solar_obs::dsl as O;
    use schema::summaries::dsl as S;

    let last_obs = O::solar_obs
        .filter(O::zip.eq_any(zips.clone()))
        .group_by(O::zip)
        .select((O::zip, max(O::obs_date)))
        .load::<(String, Option<NaiveDate>)>(conn)?;
    let today_sources = O::solar_obs
        .filter(O::obs_date.eq(today))
        .filter(O::zip.eq_any(zips.clone()))
        .select((O::zip, O::source))
        .load::<(String, String)>(conn)?;
    let summarized = S::summaries
        .filter(S::summary_date.eq(today))
        .filter(S::zip.eq_any(zips.clone()))
        .select(S::zip)
        .load::<String>(conn)?;
    let forecast_counts = F::forecast
        .filter(F::forecast_date.gt(today))
        .filter(F::zip.eq_any(zips))
        .group_by(F::zip)
        .select((F::zip, count_star()))
        .load::<(String, i64)>(conn)?;

    Ok(StatusSnapshot {
        last_obs,
        today_sources,
        summarized,
        forecast_counts,
    })
}

/// GET /status - how far today's pipeline got, per configured ZIP
async fn pipeline_status(State(state): State<AppState>) -> ApiResult<Json<StatusReport>> {
    let today = today_utc();
    let zips = state.config.zips.clone();
    let query_zips = zips.clone();
    let snapshot = with_conn(&state, move |conn| Ok(load_snapshot(conn, query_zips, today)?)).await?;
    Ok(Json(build_status(&zips, today, snapshot)))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/status", get(pipeline_status))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 15).unwrap()
    }

    fn zips() -> Vec<String> {
        vec!["93727".to_string(), "95340".to_string()]
    }

    #[test]
    fn fully_processed_day() {
        let snapshot = StatusSnapshot {
            last_obs: vec![("93727".into(), Some(today())), ("95340".into(), Some(today()))],
            today_sources: vec![
                ("93727".into(), obs_source::OPEN_METEO.into()),
                ("95340".into(), obs_source::FALLBACK.into()),
            ],
            summarized: zips(),
            forecast_counts: vec![("93727".into(), 7), ("95340".into(), 7)],
        };
        let report = build_status(&zips(), today(), snapshot);
        assert!(report.ingestion_complete);
        assert!(report.summaries_complete);
        assert!(report.forecast_complete);
        assert!(report.zips[1].fallback_today);
        assert!(!report.zips[1].observed_today);
    }

    #[test]
    fn missing_zip_blocks_completion() {
        let snapshot = StatusSnapshot {
            last_obs: vec![("93727".into(), Some(today()))],
            today_sources: vec![("93727".into(), obs_source::OPEN_METEO.into())],
            summarized: vec!["93727".into()],
            forecast_counts: vec![("93727".into(), 7), ("95340".into(), 3)],
        };
        let report = build_status(&zips(), today(), snapshot);
        assert!(!report.ingestion_complete);
        assert!(!report.summaries_complete);
        assert!(!report.forecast_complete);
        assert_eq!(
            report.zips[1],
            ZipStatus {
                zip: "95340".into(),
                last_obs_date: None,
                observed_today: false,
                fallback_today: false,
                summarized_today: false,
                forecast_days: 3,
            }
        );
    }

    #[test]
    fn empty_allow_list_is_never_complete() {
        let report = build_status(&[], today(), StatusSnapshot::default());
        assert!(!report.ingestion_complete);
        assert!(!report.summaries_complete);
        assert!(!report.forecast_complete);
        assert!(report.zips.is_empty());
    }
}
