use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use diesel::dsl::avg;
use diesel::prelude::*;
use serde::Serialize;

use super::{AppState, with_conn};
use crate::db::models::Summary;
use crate::error::ApiResult;
use crate::schema;
use crate::utils::today_utc;

#[derive(Debug, Serialize)]
pub struct SummaryRow {
    #[serde(rename = "ZIP")]
    pub zip: String,
    #[serde(rename = "SUMMARY_TEXT")]
    pub summary_text: String,
    #[serde(rename = "CREATED_AT")]
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct GhiTodayRow {
    #[serde(rename = "ZIP")]
    pub zip: String,
    #[serde(rename = "GHI_MEAN")]
    pub ghi_mean: f64,
}

/// GET /summaries - today's summary per ZIP
async fn list_summaries(State(state): State<AppState>) -> ApiResult<Json<Vec<SummaryRow>>> {
    let today = today_utc();
    let rows = with_conn(&state, move |conn| {
        use schema::summaries::dsl as S;

        Ok(S::summaries
            .filter(S::summary_date.eq(today))
            .order(S::zip)
            .select(Summary::as_select())
            .load(conn)?)
    })
    .await?;

    Ok(Json(
        rows.into_iter()
            .map(|s| SummaryRow {
                zip: s.zip,
                summary_text: s.summary_text,
                created_at: s.created_at.to_rfc3339(),
            })
            .collect(),
    ))
}

/// GET /ghitoday - today's mean GHI per ZIP
async fn ghi_today(State(state): State<AppState>) -> ApiResult<Json<Vec<GhiTodayRow>>> {
    let today = today_utc();
    let rows: Vec<(String, Option<f64>)> = with_conn(&state, move |conn| {
        use schema::solar_obs::dsl as O;

        Ok(O::solar_obs
            .filter(O::obs_date.eq(today))
            .group_by(O::zip)
            .select((O::zip, avg(O::ghi)))
            .order(O::zip)
            .load(conn)?)
    })
    .await?;

    Ok(Json(
        rows.into_iter()
            .map(|(zip, ghi)| GhiTodayRow {
                zip,
                ghi_mean: ghi.unwrap_or(0.0),
            })
            .collect(),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/summaries", get(list_summaries))
        .route("/ghitoday", get(ghi_today))
}
