//! Runtime configuration from environment variables.
//! Defaults align with a local PostgreSQL warehouse and the original ZIP set.

use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_ZIP_LIST: &str = "93727,93637,95340";
pub const DEFAULT_WAREHOUSE_HOST: &str = "localhost";
pub const DEFAULT_WAREHOUSE_NAME: &str = "SOLAR_WH";
pub const DEFAULT_WAREHOUSE_DATABASE: &str = "solar_db";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:7071";
pub const DEFAULT_INGEST_SECS: u64 = 3600;
pub const DEFAULT_INSIGHTS_SECS: u64 = 3600;

/// Chat-completions deployment used for narrative summaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrativeConfig {
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// libpq connection string (URL or keyword/value form).
    pub database_url: String,
    /// ZIP allow-list in configured order, trimmed and de-duplicated.
    pub zips: Vec<String>,
    /// Present only when endpoint, key and deployment are all set.
    pub narrative: Option<NarrativeConfig>,
    pub listen_addr: SocketAddr,
    pub ingest_interval: Duration,
    pub insights_interval: Duration,
    /// Run ingestion/insights on a timer inside `serve`.
    pub scheduler_enabled: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = match non_blank("DATABASE_URL") {
            Some(url) => url,
            None => warehouse_connection_string(
                &non_blank("WAREHOUSE_ACCOUNT").unwrap_or_else(|| DEFAULT_WAREHOUSE_HOST.to_string()),
                &non_blank("WAREHOUSE_USER").unwrap_or_else(|| "postgres".to_string()),
                // passwords may legitimately carry surrounding spaces
                &lookup("WAREHOUSE_PASSWORD").unwrap_or_else(|| "postgres".to_string()),
                &non_blank("WAREHOUSE_DATABASE").unwrap_or_else(|| DEFAULT_WAREHOUSE_DATABASE.to_string()),
                &non_blank("WAREHOUSE_NAME").unwrap_or_else(|| DEFAULT_WAREHOUSE_NAME.to_string()),
            ),
        };

        // Unset falls back to the default list; set-but-blank means "no ZIPs".
        let zips = parse_zip_list(&lookup("ZIP_LIST").unwrap_or_else(|| DEFAULT_ZIP_LIST.to_string()));

        let narrative = match (
            non_blank("NARRATIVE_ENDPOINT"),
            non_blank("NARRATIVE_API_KEY"),
            non_blank("NARRATIVE_DEPLOYMENT"),
        ) {
            (Some(endpoint), Some(api_key), Some(deployment)) => Some(NarrativeConfig {
                endpoint: endpoint.trim_end_matches('/').to_string(),
                api_key,
                deployment,
            }),
            _ => None,
        };

        let listen_addr = non_blank("LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| format!("LISTEN_ADDR must be host:port: {}", e))?;

        let secs = |key: &str, default: u64| -> Result<Duration, String> {
            match non_blank(key) {
                None => Ok(Duration::from_secs(default)),
                Some(s) => match s.parse::<u64>() {
                    Ok(0) | Err(_) => Err(format!("{} must be a positive number of seconds", key)),
                    Ok(v) => Ok(Duration::from_secs(v)),
                },
            }
        };

        let scheduler_enabled = non_blank("SCHEDULER_ENABLED")
            .map(|s| matches!(s.as_str(), "1" | "true" | "TRUE" | "yes"))
            .unwrap_or(true);

        Ok(Config {
            database_url,
            zips,
            narrative,
            listen_addr,
            ingest_interval: secs("INGEST_INTERVAL_SECS", DEFAULT_INGEST_SECS)?,
            insights_interval: secs("INSIGHTS_INTERVAL_SECS", DEFAULT_INSIGHTS_SECS)?,
            scheduler_enabled,
        })
    }

    /// Sorted, unique allow-list as served by `/zips`.
    pub fn sorted_zips(&self) -> Vec<String> {
        let mut zips = self.zips.clone();
        zips.sort();
        zips.dedup();
        zips
    }
}

/// Split a comma-separated ZIP list, dropping blanks and repeats.
pub fn parse_zip_list(raw: &str) -> Vec<String> {
    let mut zips: Vec<String> = Vec::new();
    for zip in raw.split(',').map(str::trim).filter(|z| !z.is_empty()) {
        if !zips.iter().any(|z| z == zip) {
            zips.push(zip.to_string());
        }
    }
    zips
}

/// Build a keyword/value libpq connection string from warehouse parts.
///
/// `account` is the warehouse host, optionally with `:port`.
pub fn warehouse_connection_string(
    account: &str,
    user: &str,
    password: &str,
    database: &str,
    warehouse: &str,
) -> String {
    let (host, port) = match account.rsplit_once(':') {
        Some((h, p)) if !h.is_empty() && p.parse::<u16>().is_ok() => (h, Some(p)),
        _ => (account, None),
    };
    let mut parts = vec![format!("host={}", quote_conn_value(host))];
    if let Some(port) = port {
        parts.push(format!("port={}", port));
    }
    parts.push(format!("user={}", quote_conn_value(user)));
    parts.push(format!("password={}", quote_conn_value(password)));
    parts.push(format!("dbname={}", quote_conn_value(database)));
    parts.push(format!("application_name={}", quote_conn_value(warehouse)));
    parts.join(" ")
}

fn quote_conn_value(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}
