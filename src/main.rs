pub mod models {
    pub mod chat;
    pub mod open_meteo;
    pub mod zippopotam;
}

pub mod client;
pub mod config;
pub mod db {
    pub mod models;
    pub mod session;
}
pub mod env_file;
pub mod error;
pub mod routes;
pub mod schema;
pub mod utils;
pub mod services {
    pub mod baseline;
    pub mod fake_data;
    pub mod forecast;
    pub mod ingest;
    pub mod insights;
    pub mod narrative;
    pub mod scheduler;
    pub mod summary;
}

use crate::client::ApiClient;
use crate::config::Config;
use crate::db::session::{apply_migrations, connect, with_session};
use crate::routes::AppState;
use crate::services::{fake_data, ingest, insights, scheduler};
use crate::utils::today_utc;
use log::{error, info};
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Command {
    #[default]
    Serve,
    Ingest,
    Insights,
    Forecast,
    SeedDemo,
}

impl Command {
    fn parse(name: &str) -> Option<Command> {
        match name {
            "serve" => Some(Command::Serve),
            "ingest" => Some(Command::Ingest),
            "insights" => Some(Command::Insights),
            "forecast" => Some(Command::Forecast),
            "seed-demo" => Some(Command::SeedDemo),
            _ => None,
        }
    }
}

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    env_file: Option<PathBuf>,
    command: Command,
}

fn set_env_file(parsed: &mut CliArgs, path: &str) -> Result<(), String> {
    if parsed.env_file.is_some() {
        return Err("`--env-file` provided more than once".to_string());
    }
    if path.is_empty() {
        return Err("`--env-file` requires a path argument".to_string());
    }
    parsed.env_file = Some(PathBuf::from(path));
    Ok(())
}

fn parse_args<I>(args: I) -> Result<CliArgs, String>
where
    I: IntoIterator<Item = OsString>,
{
    let mut args = args.into_iter();
    let mut parsed = CliArgs::default();
    let mut command: Option<Command> = None;
    let mut positional_only = false;

    while let Some(arg) = args.next() {
        let arg = arg
            .into_string()
            .map_err(|_| "argument contains invalid UTF-8".to_string())?;
        match arg.as_str() {
            "--" if !positional_only => positional_only = true,
            "--env-file" if !positional_only => {
                let value = args
                    .next()
                    .ok_or_else(|| "`--env-file` requires a path argument".to_string())?
                    .into_string()
                    .map_err(|_| "argument contains invalid UTF-8".to_string())?;
                set_env_file(&mut parsed, &value)?;
            }
            s if !positional_only && s.starts_with("--env-file=") => {
                set_env_file(&mut parsed, &s["--env-file=".len()..])?;
            }
            s => {
                if command.is_some() {
                    return Err(format!("unexpected argument: {}", s));
                }
                command = Some(Command::parse(s).ok_or_else(|| format!("unrecognised command: {}", s))?);
            }
        }
    }

    parsed.command = command.unwrap_or_default();
    Ok(parsed)
}

/// Load the explicit env file, or `./.env` when present.
fn load_env(explicit: Option<&PathBuf>) -> Result<Option<(PathBuf, usize)>, String> {
    let path = match explicit {
        Some(path) => {
            if !path.is_file() {
                return Err(format!("env file not found: {}", path.display()));
            }
            path.clone()
        }
        None => {
            let cwd = std::env::current_dir().map_err(|e| format!("unable to read current directory: {}", e))?;
            let default_path = cwd.join(".env");
            if !default_path.is_file() {
                return Ok(None);
            }
            default_path
        }
    };
    let applied = env_file::load(&path)?;
    Ok(Some((path, applied)))
}

fn run(command: Command) -> Result<(), String> {
    let cfg = Config::from_env()?;
    info!(
        "Config loaded (zips={}, narrative={}, listen={}, scheduler={}, ingest_interval={}s, insights_interval={}s)",
        cfg.zips.join(","),
        if cfg.narrative.is_some() { "on" } else { "off" },
        cfg.listen_addr,
        cfg.scheduler_enabled,
        cfg.ingest_interval.as_secs(),
        cfg.insights_interval.as_secs()
    );

    let mut conn = connect(&cfg.database_url)?;
    info!("Connected to warehouse");
    apply_migrations(&mut conn)?;
    drop(conn);

    let http = ApiClient::new();
    match command {
        Command::Ingest => ingest::run(&cfg.database_url, &http, &cfg.zips, today_utc()).map(|_| ()),
        Command::Insights => insights::run(&cfg, &http, today_utc()),
        Command::Forecast => {
            let written = insights::refresh_forecast(&cfg, today_utc())?;
            info!("Forecast: {} row(s) written", written);
            Ok(())
        }
        Command::SeedDemo => {
            with_session(&cfg.database_url, |conn| fake_data::run(conn, &cfg.zips, today_utc())).map(|_| ())
        }
        Command::Serve => serve(cfg, http),
    }
}

fn serve(cfg: Config, http: ApiClient) -> Result<(), String> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to start async runtime: {}", e))?;

    let cfg = Arc::new(cfg);
    let http = Arc::new(http);

    runtime.block_on(async move {
        if cfg.scheduler_enabled {
            let (job_cfg, job_http) = (cfg.clone(), http.clone());
            tokio::spawn(scheduler::run_every("ingest", cfg.ingest_interval, move || {
                ingest::run(&job_cfg.database_url, &*job_http, &job_cfg.zips, today_utc()).map(|_| ())
            }));
            let (job_cfg, job_http) = (cfg.clone(), http.clone());
            tokio::spawn(scheduler::run_every("insights", cfg.insights_interval, move || {
                insights::run(&job_cfg, &job_http, today_utc())
            }));
        } else {
            info!("Scheduler disabled via SCHEDULER_ENABLED");
        }

        let listener = tokio::net::TcpListener::bind(cfg.listen_addr)
            .await
            .map_err(|e| format!("failed to bind {}: {}", cfg.listen_addr, e))?;
        info!("Read API listening on http://{}", cfg.listen_addr);

        let app = routes::router(AppState { config: cfg.clone() });
        axum::serve(listener, app)
            .await
            .map_err(|e| format!("HTTP server failed: {}", e))
    })
}

fn main() {
    let cli = match parse_args(std::env::args_os().skip(1)) {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };
    let loaded_env = match load_env(cli.env_file.as_ref()) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // after the env file, so RUST_LOG from .env applies
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let Some((path, applied)) = loaded_env {
        info!("Environment loaded from {} ({} variable(s) applied)", path.display(), applied);
    }
    info!(
        "solar-insights {} (git {}) starting: {:?}",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH"),
        cli.command
    );

    if let Err(e) = run(cli.command) {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliArgs, String> {
        parse_args(args.iter().map(OsString::from))
    }

    #[test]
    fn defaults_to_serve() {
        assert_eq!(parse(&[]).unwrap(), CliArgs::default());
    }

    #[test]
    fn env_file_in_both_forms() {
        let a = parse(&["--env-file", "prod.env", "ingest"]).unwrap();
        assert_eq!(a.env_file, Some(PathBuf::from("prod.env")));
        assert_eq!(a.command, Command::Ingest);

        let b = parse(&["--env-file=dev.env", "--", "seed-demo"]).unwrap();
        assert_eq!(b.env_file, Some(PathBuf::from("dev.env")));
        assert_eq!(b.command, Command::SeedDemo);
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse(&["--env-file"]).is_err());
        assert!(parse(&["--env-file="]).is_err());
        assert!(parse(&["--env-file=a", "--env-file=b"]).is_err());
        assert!(parse(&["backfill"]).is_err());
        assert!(parse(&["ingest", "insights"]).is_err());
    }
}
