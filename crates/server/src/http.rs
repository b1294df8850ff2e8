use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use gst_contracts::SampleProvider;
use serde::Serialize;
use tracing::Instrument;
use ulid::Ulid;

use crate::cache::SampleCache;
use crate::config::ServerConfig;

mod assets;
mod dashboard;

#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub cache: SampleCache,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Builds the dashboard router over `provider`. The cache starts empty; the
/// first data request triggers the first fetch.
pub fn router(config: ServerConfig, provider: Arc<dyn SampleProvider>) -> Router {
    let cache = SampleCache::new(provider, config.cache_ttl);
    router_with_state(AppState { config, cache })
}

pub fn router_with_state(state: AppState) -> Router {
    Router::new()
        .route("/", get(assets::index))
        .route("/static/styles.css", get(assets::styles))
        .route("/static/script.js", get(assets::script))
        .route("/api/filters", get(dashboard::filters))
        .route("/api/studies", get(dashboard::studies))
        .route("/api/samples", get(dashboard::samples))
        .route("/api/chart", get(dashboard::chart))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct ReadyzResponse {
    status: &'static str,
    checks: BTreeMap<&'static str, bool>,
}

async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let mut checks = BTreeMap::new();
    checks.insert("samples_cached", state.cache.has_snapshot());

    let all_ready = checks.values().all(|ok| *ok);
    let status = if all_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadyzResponse {
            status: if all_ready { "ready" } else { "not_ready" },
            checks,
        }),
    )
}

async fn metrics() -> impl IntoResponse {
    match crate::metrics::render() {
        Ok((body, content_type)) => {
            let mut headers = HeaderMap::new();
            if let Ok(value) = HeaderValue::from_str(content_type.as_str()) {
                headers.insert(header::CONTENT_TYPE, value);
            }
            (headers, body).into_response()
        }
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Runs a dashboard handler inside a request span and records its metrics.
async fn observed<T, F>(route: &'static str, headers: &HeaderMap, handler: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    let request_id = extract_request_id(headers);
    let span = tracing::info_span!(
        "dashboard.request",
        request_id = %request_id,
        route,
        latency_ms = tracing::field::Empty,
        outcome = tracing::field::Empty,
    );
    let started = Instant::now();

    let result = async {
        let result = handler.await;

        let latency_ms = started.elapsed().as_millis() as u64;
        tracing::Span::current().record("latency_ms", latency_ms);
        match &result {
            Ok(_) => {
                tracing::Span::current().record("outcome", "ok");
                tracing::info!("dashboard.response");
            }
            Err((status, Json(body))) => {
                tracing::Span::current().record("outcome", body.code.as_str());
                tracing::warn!(status = status.as_u16(), "dashboard.response");
            }
        }
        result
    }
    .instrument(span)
    .await;

    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err((status, _)) => *status,
    };
    crate::metrics::observe_http_request(route, "GET", status.as_u16(), started.elapsed());
    result
}

fn extract_request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .and_then(sanitize_request_id)
        .unwrap_or_else(|| Ulid::new().to_string())
}

fn sanitize_request_id(raw: &str) -> Option<String> {
    const MAX_LEN: usize = 64;
    let out = raw
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
        .take(MAX_LEN)
        .collect::<String>();

    (!out.is_empty()).then_some(out)
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: String,
    message: String,
    retryable: bool,
}

fn json_error(
    status: StatusCode,
    code: impl Into<String>,
    message: impl Into<String>,
    retryable: bool,
) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            code: code.into(),
            message: message.into(),
            retryable,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_is_taken_from_header_when_sane() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static(" abc-123 "));
        assert_eq!(extract_request_id(&headers), "abc-123");
    }

    #[test]
    fn request_id_strips_unsafe_characters_and_caps_length() {
        assert_eq!(sanitize_request_id("a b\"c<d>").as_deref(), Some("abcd"));
        assert_eq!(sanitize_request_id("!!!"), None);

        let long = "x".repeat(200);
        assert_eq!(sanitize_request_id(&long).map(|s| s.len()), Some(64));
    }

    #[test]
    fn missing_request_id_gets_a_ulid() {
        let generated = extract_request_id(&HeaderMap::new());
        assert!(generated.parse::<Ulid>().is_ok());
    }

    #[test]
    fn error_body_carries_code_message_and_retryable() {
        let (status, Json(body)) = json_error(
            StatusCode::BAD_REQUEST,
            "ERR_INVALID_PARAMS",
            "sponsor parameter is required",
            false,
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let value = serde_json::to_value(&body).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({
                "code": "ERR_INVALID_PARAMS",
                "message": "sponsor parameter is required",
                "retryable": false,
            })
        );
    }
}
