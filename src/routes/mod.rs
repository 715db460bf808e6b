//! Read-only JSON API over the `raw` and `mart` schemas.

pub mod forecast;
pub mod health;
pub mod status;
pub mod summaries;
pub mod trend;

use axum::Router;
use diesel::PgConnection;
use diesel::prelude::*;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(summaries::router())
        .merge(trend::router())
        .merge(forecast::router())
        .merge(status::router())
        .with_state(state)
}

/// Run `f` on a blocking worker with its own warehouse session; the
/// session is dropped when `f` returns, whatever the outcome.
pub async fn with_conn<T, F>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&mut PgConnection) -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    let url = state.config.database_url.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = PgConnection::establish(&url)?;
        f(&mut conn)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("query task failed: {}", e)))?
}

/// Pick the requested ZIP (or the first configured one) and check it
/// against the allow-list.
pub fn resolve_zip(allowed: &[String], requested: Option<&str>) -> ApiResult<String> {
    let Some(first) = allowed.first() else {
        return Err(ApiError::Internal("ZIP_LIST not configured".to_string()));
    };
    let zip = requested.map(str::trim).filter(|z| !z.is_empty()).unwrap_or(first.as_str());
    if allowed.iter().any(|a| a == zip) {
        Ok(zip.to_string())
    } else {
        Err(ApiError::BadRequest(format!("zip {} not allowed", zip)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    fn state_with_zips(zip_list: &str) -> AppState {
        let zip_list = zip_list.to_string();
        let config = Config::from_lookup(|key| match key {
            "ZIP_LIST" => Some(zip_list.clone()),
            // nothing listens here, so warehouse access fails fast
            "DATABASE_URL" => Some("postgres://invalid@127.0.0.1:1/none".to_string()),
            _ => None,
        })
        .expect("test config");
        AppState {
            config: Arc::new(config),
        }
    }

    async fn get(state: AppState, uri: &str) -> (StatusCode, Value) {
        let resp = router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn missing_zip_defaults_to_first_configured() {
        let allowed = vec!["95340".to_string(), "93727".to_string()];
        assert_eq!(resolve_zip(&allowed, None).unwrap(), "95340");
        assert_eq!(resolve_zip(&allowed, Some("  ")).unwrap(), "95340");
        assert_eq!(resolve_zip(&allowed, Some(" 93727 ")).unwrap(), "93727");
    }

    #[test]
    fn empty_allow_list_is_a_server_error() {
        let err = resolve_zip(&[], Some("93727")).unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn zips_are_sorted_and_unique() {
        let (status, body) = get(state_with_zips("95340,93727,95340,93637"), "/zips").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!(["93637", "93727", "95340"]));
    }

    #[tokio::test]
    async fn trend_rejects_disallowed_zip() {
        let (status, body) = get(state_with_zips("93727"), "/ghitrend?zip=10001&days=7").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "zip 10001 not allowed");
    }

    #[tokio::test]
    async fn trend_without_allow_list_is_500() {
        let (status, body) = get(state_with_zips(""), "/ghitrend?zip=93727").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "ZIP_LIST not configured");
    }

    #[tokio::test]
    async fn trend_rejects_malformed_dates() {
        let (status, body) = get(
            state_with_zips("93727"),
            "/ghitrend?zip=93727&start=2025-13-01&end=2025-10-01",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("start"));
    }

    #[tokio::test]
    async fn trend_reports_zip_error_before_date_error() {
        let (status, body) = get(state_with_zips("93727"), "/ghitrend?zip=10001&start=bad&end=2025-10-01").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "zip 10001 not allowed");
    }

    #[tokio::test]
    async fn trend_requires_both_range_ends() {
        let (status, _) = get(state_with_zips("93727"), "/ghitrend?zip=93727&end=2025-10-01").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn forecast_rejects_disallowed_zip() {
        let (status, body) = get(state_with_zips("93727,93637"), "/forecast?zip=95340&days=3").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "zip 95340 not allowed");
    }

    #[tokio::test]
    async fn malformed_query_string_gets_json_400() {
        for uri in ["/ghitrend?zip=93727&zip=93727", "/forecast?zip=93727&zip=93637"] {
            let (status, body) = get(state_with_zips("93727,93637"), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(body["error"].as_str().unwrap().contains("zip"), "{uri}: {body}");
        }
    }

    #[tokio::test]
    async fn unreachable_warehouse_is_json_500() {
        let (status, body) = get(state_with_zips("93727"), "/summaries").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn healthz_needs_no_warehouse() {
        let (status, body) = get(state_with_zips("93727"), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
