use crate::client::ApiClient;
use crate::config::Config;
use crate::db::session::with_session;
use crate::services::narrative::NarrativeClient;
use crate::services::{baseline, forecast, summary};
use chrono::NaiveDate;
use log::{error, info};

/// Summaries first, then the forecast. A forecast failure is logged and
/// does not undo or abort the summaries already written.
pub fn run(cfg: &Config, http: &ApiClient, today: NaiveDate) -> Result<(), String> {
    info!("Insights: started for {}", today);

    let aggregates = with_session(&cfg.database_url, |conn| baseline::fetch_today_vs_baseline(conn, today))?;
    let rows = summary::with_configured_zips(aggregates, &cfg.zips);

    let narrative = cfg.narrative.as_ref().map(|n| NarrativeClient::new(http, n));
    if narrative.is_some() {
        info!("Insights: narrative service enabled for {} ZIP(s)", rows.len());
    }
    let summaries = summary::build_summaries(narrative.as_ref(), &rows, today);

    let written = with_session(&cfg.database_url, |conn| {
        summary::replace_summaries(conn, today, &summaries)
    })?;
    info!("Insights: wrote {} summary row(s)", written);

    match refresh_forecast(cfg, today) {
        Ok(n) => info!("Insights: forecast refreshed ({} row(s))", n),
        Err(e) => error!("Insights: {}", e),
    }

    info!("Insights: finished");
    Ok(())
}

pub fn refresh_forecast(cfg: &Config, today: NaiveDate) -> Result<usize, String> {
    with_session(&cfg.database_url, |conn| forecast::refresh(conn, today))
}
