//! Metrics recording implementation backed by the in-process registry.

use std::sync::Arc;

use super::exposition;
use super::registry::{
    Counter, CounterVec, HistogramVec, MetricsRegistry, RegistryError, RegistrySnapshot,
};

/// Trait for recording application metrics.
///
/// The connection supervisor records through this trait so it can be driven
/// with any recorder implementation.
pub trait MetricsRecorder: Send + Sync + 'static {
    /// Records a successful backend connection establishment.
    fn record_connect_success(&self);

    /// Records a failed backend connection attempt.
    fn record_connect_failure(&self);

    /// Records a data request served from the backend.
    fn record_app_call(&self);

    /// Records a data request rejected because the connection was not ready.
    fn record_unavailable(&self);

    /// Records a scrape of the metrics endpoint.
    fn record_metrics_read(&self);

    /// Records one handled HTTP request, whatever its outcome.
    fn record_http_request(&self, method: &str, route: &str, code: u16, elapsed_ms: f64);
}

/// The application metric set.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<MetricsRegistry>,

    web_app_calls: Counter,
    db_connection_failures: Counter,
    db_connection_successes: Counter,
    backend_unavailable_total: Counter,
    metrics_read_total: Counter,
    http_requests_total: CounterVec,
    http_request_duration_ms: HistogramVec,
}

impl Metrics {
    /// Registers the full metric set into a fresh registry.
    ///
    /// Duration buckets are in milliseconds and come from configuration; an
    /// invalid bucket list is a startup error.
    pub fn new(duration_buckets_ms: &[f64]) -> Result<Self, RegistryError> {
        let registry = Arc::new(MetricsRegistry::new());

        let web_app_calls = registry.register_counter(
            "tetherd_web_app_calls",
            "Number of times the data endpoint was served from the backend",
        )?;
        let db_connection_failures = registry.register_counter(
            "tetherd_db_connection_failures",
            "Total number of server->db connection failures",
        )?;
        let db_connection_successes = registry.register_counter(
            "tetherd_db_connection_successes",
            "Total number of server->db connection successes",
        )?;
        let backend_unavailable_total = registry.register_counter(
            "tetherd_backend_unavailable_total",
            "Requests rejected because the backend connection was not ready",
        )?;
        let metrics_read_total = registry.register_counter(
            "tetherd_metrics_read_total",
            "Total number of metric readings",
        )?;
        let http_requests_total = registry.register_counter_vec(
            "tetherd_http_requests_total",
            "Total number of handled HTTP requests",
            &["method", "route", "code"],
        )?;
        let http_request_duration_ms = registry.register_histogram_vec(
            "tetherd_http_request_duration_ms",
            "Duration of HTTP requests in ms",
            &["method", "route", "code"],
            duration_buckets_ms,
        )?;

        Ok(Metrics {
            registry,
            web_app_calls,
            db_connection_failures,
            db_connection_successes,
            backend_unavailable_total,
            metrics_read_total,
            http_requests_total,
            http_request_duration_ms,
        })
    }

    /// Takes a point-in-time copy of every metric.
    pub fn snapshot(&self) -> RegistrySnapshot {
        self.registry.snapshot()
    }

    /// Renders all metrics in the text exposition format.
    pub fn render(&self) -> String {
        exposition::render(&self.registry.snapshot())
    }
}

impl MetricsRecorder for Metrics {
    fn record_connect_success(&self) {
        self.db_connection_successes.inc();
    }

    fn record_connect_failure(&self) {
        self.db_connection_failures.inc();
    }

    fn record_app_call(&self) {
        self.web_app_calls.inc();
    }

    fn record_unavailable(&self) {
        self.backend_unavailable_total.inc();
    }

    fn record_metrics_read(&self) {
        self.metrics_read_total.inc();
    }

    fn record_http_request(&self, method: &str, route: &str, code: u16, elapsed_ms: f64) {
        let code = code.to_string();
        self.http_requests_total
            .with_label_values(&[method, route, &code])
            .inc();
        self.http_request_duration_ms
            .with_label_values(&[method, route, &code])
            .observe(elapsed_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::registry::SampleValue;

    #[test]
    fn http_requests_bump_both_the_counter_and_the_histogram() {
        let metrics = Metrics::new(&[1.0, 5.0]).unwrap();
        metrics.record_http_request("GET", "/welcome", 200, 2.0);
        metrics.record_http_request("GET", "/welcome", 200, 0.5);

        let snapshot = metrics.snapshot();
        let requests = snapshot
            .families
            .iter()
            .find(|f| f.name == "tetherd_http_requests_total")
            .unwrap();
        assert!(matches!(requests.samples[0].value, SampleValue::Counter(2)));

        let durations = snapshot
            .families
            .iter()
            .find(|f| f.name == "tetherd_http_request_duration_ms")
            .unwrap();
        let SampleValue::Histogram(h) = &durations.samples[0].value else {
            panic!("expected a histogram sample");
        };
        assert_eq!(h.count, 2);
        assert_eq!(h.buckets, vec![(1.0, 1), (5.0, 2)]);
    }

    #[test]
    fn duplicate_bucket_config_is_rejected() {
        assert!(Metrics::new(&[5.0, 1.0]).is_err());
    }
}
