//! Prometheus metrics shared by every engine in the process.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::time::Duration;

pub const REQUESTS_TOTAL: &str = "http_requests_total";
pub const REQUEST_DURATION: &str = "http_request_duration_seconds";

/// Default span collector endpoint, used when tracing is enabled without one.
pub const DEFAULT_COLLECTOR: &str = "http://localhost:14268/api/traces";

static PROMETHEUS: OnceCell<PrometheusHandle> = OnceCell::new();

/// Installs the process-wide recorder on first use and returns a handle to it.
///
/// Several applications in one process share the recorder; their series are told apart by the
/// `app` label.
pub fn prometheus_handle() -> Result<PrometheusHandle, BuildError> {
    PROMETHEUS
        .get_or_try_init(|| {
            let handle = PrometheusBuilder::new().install_recorder()?;
            metrics::describe_counter!(REQUESTS_TOTAL, "Total number of HTTP requests served");
            metrics::describe_histogram!(REQUEST_DURATION, metrics::Unit::Seconds, "HTTP request latency");
            Ok(handle)
        })
        .cloned()
}

pub(crate) fn record_request(app: &str, method: &http::Method, status: http::StatusCode, elapsed: Duration) {
    let labels = [
        ("app", app.to_string()),
        ("method", method.as_str().to_string()),
        ("status", status.as_u16().to_string()),
    ];
    metrics::counter!(REQUESTS_TOTAL, &labels).increment(1);
    metrics::histogram!(REQUEST_DURATION, &labels).record(elapsed.as_secs_f64());
}
