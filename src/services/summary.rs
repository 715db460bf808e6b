//! Daily trend summaries per ZIP, written to `mart.summaries`.

use crate::db::models::{NewSummary, TodayVsBaseline};
use crate::schema;
use crate::services::baseline::pct_change;
use crate::services::narrative::{NarrativeClient, NarrativeInput};
use chrono::NaiveDate;
use diesel::PgConnection;
use diesel::prelude::*;
use log::{info, warn};

/// Percent band around the baseline that still counts as "near".
pub const NEAR_BAND_PCT: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Above,
    Below,
    Near,
}

impl Trend {
    pub fn classify(pct: f64) -> Trend {
        if pct > NEAR_BAND_PCT {
            Trend::Above
        } else if pct < -NEAR_BAND_PCT {
            Trend::Below
        } else {
            Trend::Near
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Trend::Above => "above",
            Trend::Below => "below",
            Trend::Near => "near",
        }
    }
}

/// Deterministic one-line summary for a ZIP.
pub fn heuristic_summary(row: &TodayVsBaseline) -> String {
    let zip = row.zip.as_str();
    let Some(ghi) = row.ghi_today else {
        return format!("{}: no data today yet.", zip);
    };
    let dni = row.dni_today.unwrap_or(0.0);
    let cloud = row.cloud_today.unwrap_or(0.0);
    let means = format!("GHI ≈ {:.1} W/m², DNI ≈ {:.1} W/m², cloud ≈ {:.1}%.", ghi, dni, cloud);

    match (row.ghi_30d, pct_change(row.ghi_today, row.ghi_30d)) {
        (None, _) => format!("{}: first day of data — mean {}", zip, means),
        (Some(_), None) => format!("{}: 30-day baseline is zero, so no trend yet — mean {}", zip, means),
        (Some(_), Some(pct)) => format!(
            "{}: today’s solar potential is {} the 30-day baseline ({:+.1}%). Mean {}",
            zip,
            Trend::classify(pct).as_str(),
            pct,
            means
        ),
    }
}

/// Narrative text when the service is configured and answers, else the heuristic.
pub fn summary_text(narrative: Option<&NarrativeClient<'_>>, row: &TodayVsBaseline) -> String {
    let (Some(client), Some(ghi_today)) = (narrative, row.ghi_today) else {
        return heuristic_summary(row);
    };

    let pct = pct_change(row.ghi_today, row.ghi_30d);
    let input = NarrativeInput {
        zip: &row.zip,
        ghi_today,
        dni_today: row.dni_today.unwrap_or(0.0),
        cloud_today: row.cloud_today.unwrap_or(0.0),
        ghi_baseline: row.ghi_30d,
        pct_change: pct,
        trend: pct.map(|p| Trend::classify(p).as_str()),
    };
    match client.summarize(&input) {
        Ok(text) => text,
        Err(e) => {
            warn!("Summary: narrative service failed for {}: {}; using heuristic text", row.zip, e);
            heuristic_summary(row)
        }
    }
}

/// Add "no data" rows for configured ZIPs absent from the aggregate; result is sorted by ZIP.
pub fn with_configured_zips(mut rows: Vec<TodayVsBaseline>, zips: &[String]) -> Vec<TodayVsBaseline> {
    for zip in zips {
        if !rows.iter().any(|r| &r.zip == zip) {
            rows.push(TodayVsBaseline {
                zip: zip.clone(),
                ..Default::default()
            });
        }
    }
    rows.sort_by(|a, b| a.zip.cmp(&b.zip));
    rows
}

pub fn build_summaries(
    narrative: Option<&NarrativeClient<'_>>,
    rows: &[TodayVsBaseline],
    today: NaiveDate,
) -> Vec<NewSummary> {
    rows.iter()
        .map(|row| NewSummary {
            summary_date: today,
            zip: row.zip.clone(),
            summary_text: summary_text(narrative, row),
        })
        .collect()
}

/// Replace today's summaries for the given ZIPs in one transaction.
pub fn replace_summaries(conn: &mut PgConnection, today: NaiveDate, rows: &[NewSummary]) -> Result<usize, String> {
    if rows.is_empty() {
        return Ok(0);
    }

    use schema::summaries::dsl as S;

    let zips: Vec<&str> = rows.iter().map(|r| r.zip.as_str()).collect();
    conn.transaction::<usize, diesel::result::Error, _>(|conn| {
        let removed = diesel::delete(S::summaries.filter(S::summary_date.eq(today).and(S::zip.eq_any(zips))))
            .execute(conn)?;
        let inserted = diesel::insert_into(S::summaries).values(rows).execute(conn)?;
        info!("Summary: replaced {} existing row(s) with {} for {}", removed, inserted, today);
        Ok(inserted)
    })
    .map_err(|e| format!("replace summaries failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(zip: &str, ghi_today: Option<f64>, ghi_30d: Option<f64>) -> TodayVsBaseline {
        TodayVsBaseline {
            zip: zip.to_string(),
            ghi_today,
            dni_today: ghi_today.map(|_| 150.0),
            cloud_today: ghi_today.map(|_| 12.34),
            ghi_30d,
            ..Default::default()
        }
    }

    #[test]
    fn classification_boundaries() {
        assert_eq!(Trend::classify(10.0), Trend::Near);
        assert_eq!(Trend::classify(10.01), Trend::Above);
        assert_eq!(Trend::classify(-10.0), Trend::Near);
        assert_eq!(Trend::classify(-10.01), Trend::Below);
        assert_eq!(Trend::classify(0.0), Trend::Near);
    }

    #[test]
    fn no_today_data_message() {
        assert_eq!(heuristic_summary(&row("93727", None, Some(200.0))), "93727: no data today yet.");
    }

    #[test]
    fn first_day_reports_raw_means() {
        let text = heuristic_summary(&row("93637", Some(201.26), None));
        assert_eq!(
            text,
            "93637: first day of data — mean GHI ≈ 201.3 W/m², DNI ≈ 150.0 W/m², cloud ≈ 12.3%."
        );
    }

    #[test]
    fn zero_baseline_has_no_trend() {
        let text = heuristic_summary(&row("95340", Some(120.0), Some(0.0)));
        assert!(text.starts_with("95340: 30-day baseline is zero"));
        assert!(text.contains("GHI ≈ 120.0"));
    }

    #[test]
    fn trend_sentence_uses_signed_percent() {
        let above = heuristic_summary(&row("93727", Some(250.0), Some(200.0)));
        assert_eq!(
            above,
            "93727: today’s solar potential is above the 30-day baseline (+25.0%). \
             Mean GHI ≈ 250.0 W/m², DNI ≈ 150.0 W/m², cloud ≈ 12.3%."
        );

        let below = heuristic_summary(&row("93727", Some(150.0), Some(200.0)));
        assert!(below.contains("is below the 30-day baseline (-25.0%)"));

        let near = heuristic_summary(&row("93727", Some(220.0), Some(200.0)));
        assert!(near.contains("is near the 30-day baseline (+10.0%)"));
    }

    #[test]
    fn without_narrative_client_heuristic_is_used() {
        let r = row("93727", Some(250.0), Some(200.0));
        assert_eq!(summary_text(None, &r), heuristic_summary(&r));
    }

    #[test]
    fn configured_zips_without_data_get_rows() {
        let rows = vec![row("95340", Some(100.0), None), row("00001", Some(1.0), None)];
        let zips = vec!["93727".to_string(), "95340".to_string()];
        let merged = with_configured_zips(rows, &zips);
        let names: Vec<&str> = merged.iter().map(|r| r.zip.as_str()).collect();
        assert_eq!(names, vec!["00001", "93727", "95340"]);
        assert_eq!(merged[1].ghi_today, None);
    }

    #[test]
    fn summaries_are_dated_today() {
        let today = NaiveDate::from_ymd_opt(2025, 10, 15).unwrap();
        let built = build_summaries(None, &[row("93727", None, None)], today);
        assert_eq!(
            built,
            vec![NewSummary {
                summary_date: today,
                zip: "93727".to_string(),
                summary_text: "93727: no data today yet.".to_string(),
            }]
        );
    }
}
