use std::collections::BTreeMap;

use http::Method;
use tracing::warn;

use crate::observability::metrics::try_metrics;

/// Context recorded ahead of a diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breadcrumb {
    pub category: String,
    pub message: String,
    pub data: BTreeMap<String, String>,
}

impl Breadcrumb {
    pub fn for_failed_request(method: &Method, path: &str, status: Option<u16>, error: &str) -> Self {
        let mut data = BTreeMap::new();
        data.insert("method".to_owned(), method.to_string());
        data.insert("path".to_owned(), path.to_owned());
        data.insert(
            "status".to_owned(),
            status.map(|s| s.to_string()).unwrap_or_else(|| "none".to_owned()),
        );
        data.insert("error".to_owned(), error.to_owned());
        Self {
            category: "kyc".to_owned(),
            message: format!("{} {} failed", method, path),
            data,
        }
    }
}

/// Observability sink. Fire and forget: implementations must not fail or block.
pub trait DiagnosticsSink: Send + Sync {
    fn breadcrumb(&self, breadcrumb: Breadcrumb);
    fn message(&self, message: &str);
}

/// Default sink writing to `tracing` and the metrics registry.
#[derive(Debug, Clone, Default)]
pub struct TracingDiagnostics;

impl DiagnosticsSink for TracingDiagnostics {
    fn breadcrumb(&self, breadcrumb: Breadcrumb) {
        warn!(
            category = %breadcrumb.category,
            data = ?breadcrumb.data,
            "breadcrumb: {}",
            breadcrumb.message
        );
        if let Some(metrics) = try_metrics() {
            metrics.diagnostic_events.with_label_values(&["breadcrumb"]).inc();
        }
    }

    fn message(&self, message: &str) {
        warn!("diagnostic: {}", message);
        if let Some(metrics) = try_metrics() {
            metrics.diagnostic_events.with_label_values(&["message"]).inc();
        }
    }
}
