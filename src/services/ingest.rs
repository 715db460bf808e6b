use crate::client::{ApiClient, ClientError, RecentMeans};
use crate::db::models::{NewObservation, obs_source};
use crate::db::session::with_session;
use crate::schema;
use chrono::NaiveDate;
use diesel::PgConnection;
use diesel::prelude::*;
use diesel::upsert::excluded;
use log::{info, warn};

/// Where ingestion gets coordinates and hourly means from.
pub trait IrradianceSource {
    fn coordinates(&self, zip: &str) -> Result<(f64, f64), ClientError>;
    fn recent_means(&self, lat: f64, lon: f64) -> Result<RecentMeans, ClientError>;
}

impl IrradianceSource for ApiClient {
    fn coordinates(&self, zip: &str) -> Result<(f64, f64), ClientError> {
        self.zip_to_latlon(zip)
    }

    fn recent_means(&self, lat: f64, lon: f64) -> Result<RecentMeans, ClientError> {
        ApiClient::recent_means(self, lat, lon)
    }
}

/// Build the observation for one ZIP. Upstream failures degrade to the
/// fallback record so one bad ZIP never blocks the rest of the run.
pub fn build_record(source: &impl IrradianceSource, zip: &str, obs_date: NaiveDate) -> NewObservation {
    let zip = zip.trim();
    let fetched = source
        .coordinates(zip)
        .and_then(|(lat, lon)| source.recent_means(lat, lon))
        .and_then(check_means);

    match fetched {
        Ok(m) => {
            let rec = NewObservation {
                obs_date,
                zip: zip.to_string(),
                ghi: m.ghi,
                dni: m.dni,
                dhi: m.dhi,
                cloud_cover: m.cloud_cover,
                temp_c: m.temp_c,
                source: obs_source::OPEN_METEO.to_string(),
            };
            info!(
                "Ingest: {} -> ghi={:.1} dni={:.1} dhi={:.1} cloud={:.1}% temp={:.1}C",
                zip, rec.ghi, rec.dni, rec.dhi, rec.cloud_cover, rec.temp_c
            );
            rec
        }
        Err(e) => {
            warn!("Ingest: upstream fetch failed for {}: {}; using fallback zeros", zip, e);
            NewObservation::fallback(obs_date, zip)
        }
    }
}

/// Irradiance and cloud cover must be finite and non-negative, temperature
/// finite. Anything else would fail the table CHECKs for the whole batch.
fn check_means(m: RecentMeans) -> Result<RecentMeans, ClientError> {
    let bounded = [("ghi", m.ghi), ("dni", m.dni), ("dhi", m.dhi), ("cloud_cover", m.cloud_cover)];
    for (name, value) in bounded {
        if !value.is_finite() || value < 0.0 {
            return Err(ClientError::InvalidData(format!("{} = {}", name, value)));
        }
    }
    if !m.temp_c.is_finite() {
        return Err(ClientError::InvalidData(format!("temp_c = {}", m.temp_c)));
    }
    Ok(m)
}

/// Upsert observations; a repeat for the same (date, ZIP) replaces the day's values.
pub fn insert_observations(conn: &mut PgConnection, rows: &[NewObservation]) -> Result<usize, String> {
    if rows.is_empty() {
        return Ok(0);
    }

    use schema::solar_obs::dsl as O;

    diesel::insert_into(O::solar_obs)
        .values(rows)
        .on_conflict((O::obs_date, O::zip))
        .do_update()
        .set((
            O::ghi.eq(excluded(O::ghi)),
            O::dni.eq(excluded(O::dni)),
            O::dhi.eq(excluded(O::dhi)),
            O::cloud_cover.eq(excluded(O::cloud_cover)),
            O::temp_c.eq(excluded(O::temp_c)),
            O::source.eq(excluded(O::source)),
            O::ingested_at.eq(diesel::dsl::now),
        ))
        .execute(conn)
        .map_err(|e| format!("insert observation rows failed: {}", e))
}

/// One ingestion run: fetch every ZIP, then open a session and write all
/// records in one statement.
pub fn run(
    database_url: &str,
    source: &impl IrradianceSource,
    zips: &[String],
    today: NaiveDate,
) -> Result<usize, String> {
    info!("Ingest: started for {} ZIP(s): {}", zips.len(), zips.join(","));
    let rows: Vec<NewObservation> = zips.iter().map(|z| build_record(source, z, today)).collect();
    if rows.is_empty() {
        warn!("Ingest: no rows to insert; skipping warehouse write");
        return Ok(0);
    }

    let fallbacks = rows.iter().filter(|r| r.source == obs_source::FALLBACK).count();
    let written = with_session(database_url, |conn| insert_observations(conn, &rows))?;
    info!(
        "Ingest: wrote {} row(s) for {} ({} fallback)",
        written, today, fallbacks
    );
    Ok(written)
}
