//! Today vs. trailing-30-day aggregates per ZIP.

use crate::db::models::TodayVsBaseline;
use chrono::NaiveDate;
use diesel::PgConnection;
use diesel::prelude::*;
use diesel::sql_types::Date;

/// Baseline covers today-30 ..= today-1; today is excluded. The full outer
/// join keeps ZIPs that only appear in one of the two windows.
const TODAY_VS_BASELINE_SQL: &str = r#"
WITH today AS (
    SELECT zip,
           AVG(ghi)         AS ghi_today,
           AVG(dni)         AS dni_today,
           AVG(dhi)         AS dhi_today,
           AVG(cloud_cover) AS cloud_today
    FROM raw.solar_obs
    WHERE obs_date = $1
    GROUP BY zip
),
baseline AS (
    SELECT zip,
           AVG(ghi)         AS ghi_30d,
           AVG(dni)         AS dni_30d,
           AVG(dhi)         AS dhi_30d,
           AVG(cloud_cover) AS cloud_30d
    FROM raw.solar_obs
    WHERE obs_date BETWEEN $1 - 30 AND $1 - 1
    GROUP BY zip
)
SELECT COALESCE(t.zip, b.zip) AS zip,
       t.ghi_today, t.dni_today, t.dhi_today, t.cloud_today,
       b.ghi_30d, b.dni_30d, b.dhi_30d, b.cloud_30d
FROM today t
FULL OUTER JOIN baseline b ON t.zip = b.zip
ORDER BY 1
"#;

pub fn fetch_today_vs_baseline(conn: &mut PgConnection, today: NaiveDate) -> Result<Vec<TodayVsBaseline>, String> {
    diesel::sql_query(TODAY_VS_BASELINE_SQL)
        .bind::<Date, _>(today)
        .load::<TodayVsBaseline>(conn)
        .map_err(|e| format!("today-vs-baseline query failed: {}", e))
}

/// Percent change of `today` over `baseline`; undefined without both values
/// or with a zero baseline.
pub fn pct_change(today: Option<f64>, baseline: Option<f64>) -> Option<f64> {
    let today = today?;
    let baseline = baseline?;
    if baseline == 0.0 {
        return None;
    }
    Some((today - baseline) / baseline * 100.0)
}
