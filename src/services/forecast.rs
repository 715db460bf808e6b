//! 7-day moving-average GHI forecast, written to `mart.forecast`.

use crate::db::models::{NewForecastEntry, forecast_method};
use crate::schema;
use chrono::{Duration, NaiveDate};
use diesel::PgConnection;
use diesel::dsl::avg;
use diesel::prelude::*;
use diesel::sql_types::BigInt;
use log::info;

/// Future days written per ZIP.
pub const HORIZON_DAYS: i64 = 7;
/// Trailing days averaged, today included.
pub const TRAILING_DAYS: i64 = 7;

/// Key for `pg_advisory_xact_lock`; serialises overlapping refreshes.
const FORECAST_LOCK_KEY: i64 = 0x534f_4c41_525f_4643;

/// Forecast rows for one ZIP: `mean` held constant over today+1 ..= today+7.
pub fn build_forecast_rows(zip: &str, mean_ghi: f64, today: NaiveDate) -> Vec<NewForecastEntry> {
    (1..=HORIZON_DAYS)
        .map(|offset| NewForecastEntry {
            zip: zip.to_string(),
            forecast_date: today + Duration::days(offset),
            predicted_ghi: mean_ghi,
            method: forecast_method::MOVING_AVERAGE_7D.to_string(),
        })
        .collect()
}

/// Per-ZIP mean GHI over today-6 ..= today.
pub fn trailing_means(conn: &mut PgConnection, today: NaiveDate) -> QueryResult<Vec<(String, Option<f64>)>> {
    use schema::solar_obs::dsl as O;

    let first_day = today - Duration::days(TRAILING_DAYS - 1);
    O::solar_obs
        .filter(O::obs_date.ge(first_day).and(O::obs_date.le(today)))
        .group_by(O::zip)
        .select((O::zip, avg(O::ghi)))
        .order(O::zip)
        .load::<(String, Option<f64>)>(conn)
}

/// Delete every forecast row from tomorrow on and write a fresh 7-day block
/// per ZIP, all inside one locked transaction.
pub fn refresh(conn: &mut PgConnection, today: NaiveDate) -> Result<usize, String> {
    use schema::forecast::dsl as F;

    let tomorrow = today + Duration::days(1);
    conn.transaction::<usize, diesel::result::Error, _>(|conn| {
        diesel::sql_query("SELECT pg_advisory_xact_lock($1)")
            .bind::<BigInt, _>(FORECAST_LOCK_KEY)
            .execute(conn)?;

        let removed = diesel::delete(F::forecast.filter(F::forecast_date.ge(tomorrow))).execute(conn)?;

        let rows: Vec<NewForecastEntry> = trailing_means(conn, today)?
            .into_iter()
            .filter_map(|(zip, mean)| mean.map(|m| build_forecast_rows(&zip, m, today)))
            .flatten()
            .collect();

        let inserted = if rows.is_empty() {
            0
        } else {
            diesel::insert_into(F::forecast).values(&rows).execute(conn)?
        };
        info!(
            "Forecast: replaced {} future row(s) with {} ({} ZIP(s), from {})",
            removed,
            inserted,
            rows.len() / HORIZON_DAYS as usize,
            tomorrow
        );
        Ok(inserted)
    })
    .map_err(|e| format!("forecast refresh failed: {}", e))
}
