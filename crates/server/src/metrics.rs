use std::sync::OnceLock;
use std::time::Duration;

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

static REGISTRY: OnceLock<Registry> = OnceLock::new();
static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
static CACHE_LOOKUPS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static PROVIDER_FETCHES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static PROVIDER_FETCH_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

fn register_collector<T>(collector: T) -> T
where
    T: prometheus::core::Collector + Clone + 'static,
{
    let _ = registry().register(Box::new(collector.clone()));
    collector
}

fn http_requests_total() -> &'static IntCounterVec {
    HTTP_REQUESTS_TOTAL.get_or_init(|| {
        register_collector(
            IntCounterVec::new(
                Opts::new("gst_http_requests_total", "Dashboard HTTP request count."),
                &["route", "method", "status"],
            )
            .expect("create gst_http_requests_total"),
        )
    })
}

fn http_request_duration_seconds() -> &'static HistogramVec {
    HTTP_REQUEST_DURATION_SECONDS.get_or_init(|| {
        register_collector(
            HistogramVec::new(
                HistogramOpts::new(
                    "gst_http_request_duration_seconds",
                    "Dashboard HTTP request duration in seconds.",
                )
                .buckets(vec![
                    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 60.0,
                ]),
                &["route", "method", "outcome"],
            )
            .expect("create gst_http_request_duration_seconds"),
        )
    })
}

fn cache_lookups_total() -> &'static IntCounterVec {
    CACHE_LOOKUPS_TOTAL.get_or_init(|| {
        register_collector(
            IntCounterVec::new(
                Opts::new(
                    "gst_cache_lookups_total",
                    "Sample cache lookups by outcome (hit, refresh, joined).",
                ),
                &["outcome"],
            )
            .expect("create gst_cache_lookups_total"),
        )
    })
}

fn provider_fetches_total() -> &'static IntCounterVec {
    PROVIDER_FETCHES_TOTAL.get_or_init(|| {
        register_collector(
            IntCounterVec::new(
                Opts::new(
                    "gst_provider_fetches_total",
                    "Sample provider fetches by outcome.",
                ),
                &["outcome"],
            )
            .expect("create gst_provider_fetches_total"),
        )
    })
}

fn provider_fetch_duration_seconds() -> &'static HistogramVec {
    PROVIDER_FETCH_DURATION_SECONDS.get_or_init(|| {
        register_collector(
            HistogramVec::new(
                HistogramOpts::new(
                    "gst_provider_fetch_duration_seconds",
                    "Sample provider fetch duration in seconds.",
                )
                // Warehouse queries routinely run for minutes.
                .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
                &["outcome"],
            )
            .expect("create gst_provider_fetch_duration_seconds"),
        )
    })
}

pub fn observe_http_request(route: &str, method: &str, status: u16, duration: Duration) {
    let status_str = status.to_string();
    http_requests_total()
        .with_label_values(&[route, method, status_str.as_str()])
        .inc();

    let outcome = if (200..400).contains(&status) {
        "success"
    } else {
        "error"
    };
    http_request_duration_seconds()
        .with_label_values(&[route, method, outcome])
        .observe(duration.as_secs_f64());
}

pub fn observe_cache_lookup(outcome: &str) {
    cache_lookups_total().with_label_values(&[outcome]).inc();
}

pub fn observe_provider_fetch(outcome: &str, duration: Duration) {
    provider_fetches_total().with_label_values(&[outcome]).inc();
    provider_fetch_duration_seconds()
        .with_label_values(&[outcome])
        .observe(duration.as_secs_f64());
}

pub fn render() -> Result<(Vec<u8>, String), prometheus::Error> {
    let _ = cache_lookups_total();
    let _ = provider_fetches_total();

    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok((buffer, encoder.format_type().to_string()))
}
