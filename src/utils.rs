use chrono::{Duration, NaiveDate, Utc};

pub const TREND_DEFAULT_DAYS: i64 = 7;
pub const TREND_MIN_DAYS: i64 = 3;
pub const TREND_MAX_DAYS: i64 = 60;
pub const FORECAST_DEFAULT_DAYS: i64 = 7;
pub const FORECAST_MIN_DAYS: i64 = 1;
pub const FORECAST_MAX_DAYS: i64 = 30;
/// Longest explicit start/end range served by the trend endpoint.
pub const MAX_RANGE_DAYS: i64 = 60;

/// Pipeline "today": the current UTC calendar date.
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

/// Parse a day count, falling back to `default` when absent or not an
/// integer, then clamp into `min..=max`.
pub fn clamp_days(raw: Option<&str>, default: i64, min: i64, max: i64) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .unwrap_or(default)
        .clamp(min, max)
}

/// Strict ISO-8601 calendar date (`YYYY-MM-DD`).
pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Order a date range and cap it at `max_days` (inclusive), keeping the
/// most recent days up to `end`.
pub fn normalize_range(start: NaiveDate, end: NaiveDate, max_days: i64) -> (NaiveDate, NaiveDate) {
    let (start, end) = if start > end { (end, start) } else { (start, end) };
    let span = (end - start).num_days() + 1;
    if span > max_days {
        (end - Duration::days(max_days - 1), end)
    } else {
        (start, end)
    }
}
