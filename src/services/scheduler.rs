//! Fixed-interval background jobs inside the `serve` process.

use log::{error, info};
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;

/// Run `job` now and then every `interval`, never overlapping itself.
/// Ticks missed while a run is still going are skipped.
pub async fn run_every<F>(name: &'static str, interval: Duration, job: F)
where
    F: Fn() -> Result<(), String> + Send + Sync + Clone + 'static,
{
    info!("Scheduler: {} every {}s", name, interval.as_secs());
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let started = Instant::now();
        let job = job.clone();
        match tokio::task::spawn_blocking(move || job()).await {
            Ok(Ok(())) => info!("Scheduler: {} finished in {:.1}s", name, started.elapsed().as_secs_f64()),
            Ok(Err(e)) => error!("Scheduler: {} failed: {}", name, e),
            Err(e) => error!("Scheduler: {} task aborted: {}", name, e),
        }
    }
}
