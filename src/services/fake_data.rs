use crate::db::models::{NewObservation, obs_source};
use crate::services::ingest::insert_observations;
use chrono::{Datelike, Duration, NaiveDate};
use diesel::PgConnection;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

/// Days of history seeded, today included; enough for a full 30-day baseline.
pub const SEED_DAYS: i64 = 45;
const SEED: u64 = 0x0501_a2ed_0bad_5eed;

/// Seed deterministic synthetic daily observations for `zips`, ending today.
/// Existing rows for the same (date, ZIP) are overwritten.
pub fn run(conn: &mut PgConnection, zips: &[String], today: NaiveDate) -> Result<usize, String> {
    if zips.is_empty() {
        return Err("Fake data generator requires at least one ZIP in ZIP_LIST".to_string());
    }

    let start = today - Duration::days(SEED_DAYS - 1);
    info!(
        "Fake data: generating synthetic observations for {} ZIP(s) from {} to {}",
        zips.len(),
        start,
        today
    );

    let rows = generate(zips, start, today);
    let inserted = insert_observations(conn, &rows)?;
    info!("Fake data: complete (days={}, rows={})", SEED_DAYS, inserted);
    Ok(inserted)
}

pub fn generate(zips: &[String], start: NaiveDate, end: NaiveDate) -> Vec<NewObservation> {
    let mut rng = StdRng::seed_from_u64(SEED);
    let mut rows = Vec::new();
    let mut day = start;
    while day <= end {
        let annual_fraction = day.ordinal0() as f64 / 365.0;
        for (index, zip) in zips.iter().enumerate() {
            rows.push(synthetic_day(zip, index as f64, day, annual_fraction, &mut rng));
        }
        day += Duration::days(1);
    }
    rows
}

fn synthetic_day(zip: &str, zip_index: f64, day: NaiveDate, annual_fraction: f64, rng: &mut StdRng) -> NewObservation {
    let cloud_cover = compute_cloud_cover(rng);
    let clear_sky = compute_clear_sky_ghi(annual_fraction, zip_index);
    let ghi = clear_sky * cloud_attenuation(cloud_cover);
    // diffuse share grows as the sky closes in
    let diffuse_share = (0.15 + 0.7 * cloud_cover / 100.0).clamp(0.1, 0.95);
    let dhi = ghi * diffuse_share;
    let dni = (ghi - dhi).max(0.0) * rng.random_range(1.15..=1.45);

    NewObservation {
        obs_date: day,
        zip: zip.to_string(),
        ghi,
        dni,
        dhi,
        cloud_cover,
        temp_c: compute_temp(annual_fraction, cloud_cover, rng),
        source: obs_source::SYNTHETIC.to_string(),
    }
}

/// Daily-mean clear-sky GHI peaking near the June solstice.
fn compute_clear_sky_ghi(annual_fraction: f64, zip_index: f64) -> f64 {
    let seasonal = ((annual_fraction - 0.47) * 2.0 * PI).cos();
    let site_bias = (zip_index * 1.7).sin() * 8.0;
    (235.0 + 95.0 * seasonal + site_bias).max(40.0)
}

/// Kasten-Czeplak style reduction of clear-sky irradiance by cloud cover.
fn cloud_attenuation(cloud_cover_pct: f64) -> f64 {
    1.0 - 0.75 * (cloud_cover_pct / 100.0).powf(3.4)
}

fn compute_cloud_cover(rng: &mut StdRng) -> f64 {
    if rng.random_bool(0.15) {
        rng.random_range(70.0..=100.0)
    } else {
        rng.random_range(0.0..=45.0)
    }
}

fn compute_temp(annual_fraction: f64, cloud_cover: f64, rng: &mut StdRng) -> f64 {
    let seasonal = ((annual_fraction - 0.55) * 2.0 * PI).cos() * 10.0;
    let cloud_cooling = cloud_cover / 100.0 * 3.0;
    (18.0 + seasonal - cloud_cooling + rng.random_range(-2.0..=2.0)).clamp(-5.0, 45.0)
}
