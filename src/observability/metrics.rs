use std::sync::Arc;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tokio::sync::OnceCell;
use tracing::info;

// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the static `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE
        .get_or_init(|| async {
            info!("Initializing Metrics ...");
            Metrics::new()
        })
        .await
}

/// Metrics if already initialized, for synchronous callers.
pub fn try_metrics() -> Option<&'static Arc<Metrics>> {
    METRICS_INSTANCE.get()
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Request metrics
    pub requests: IntCounterVec,
    pub request_duration: HistogramVec,

    // Refresh metrics
    pub refreshes: IntCounterVec,
    pub refresh_in_flight: IntGauge,
    pub refresh_waiters: IntCounter,
    pub replays: IntCounterVec,

    // Diagnostics
    pub diagnostic_events: IntCounterVec,

    // Config
    pub config_errors: IntCounter,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("authclient".into()), None)
            .expect("valid registry prefix");

        let metrics: Arc<Metrics> = Arc::new(Self {
            // Requests
            requests: IntCounterVec::new(Opts::new("requests_total", "Requests by method and outcome"), &["method", "outcome"]).expect("requests_total"),
            request_duration: HistogramVec::new(HistogramOpts::new("request_duration_seconds", "Request duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]), &["method"]).expect("request_duration_seconds"),

            // Refresh
            refreshes: IntCounterVec::new(Opts::new("token_refresh_total", "Token refresh calls by result"), &["result"]).expect("token_refresh_total"),
            refresh_in_flight: IntGauge::new("token_refresh_in_flight", "1 while a token refresh is in flight").expect("token_refresh_in_flight"),
            refresh_waiters: IntCounter::new("token_refresh_waiters_total", "Requests queued behind an in-flight refresh").expect("token_refresh_waiters_total"),
            replays: IntCounterVec::new(Opts::new("request_replays_total", "Requests replayed after a refresh, by result"), &["result"]).expect("request_replays_total"),

            diagnostic_events: IntCounterVec::new(Opts::new("diagnostic_events_total", "Diagnostic breadcrumbs and messages"), &["kind"]).expect("diagnostic_events_total"),

            config_errors: IntCounter::new("config_errors_total", "Config parse and validation errors").expect("config_errors_total"),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        let _ = reg.register(Box::new(metrics.requests.clone()));
        let _ = reg.register(Box::new(metrics.request_duration.clone()));
        let _ = reg.register(Box::new(metrics.refreshes.clone()));
        let _ = reg.register(Box::new(metrics.refresh_in_flight.clone()));
        let _ = reg.register(Box::new(metrics.refresh_waiters.clone()));
        let _ = reg.register(Box::new(metrics.replays.clone()));
        let _ = reg.register(Box::new(metrics.diagnostic_events.clone()));
        let _ = reg.register(Box::new(metrics.config_errors.clone()));

        metrics
    }

    /// Prometheus text exposition of the registry.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if encoder.encode(&self.registry.gather(), &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
