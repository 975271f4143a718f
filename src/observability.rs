use crate::error::{DashboardError, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static PROMETHEUS: OnceCell<PrometheusHandle> = OnceCell::new();

/// Installs the Prometheus recorder. Safe to call more than once; the first
/// installation wins.
pub fn install_metrics() -> Result<()> {
    PROMETHEUS
        .get_or_try_init(|| {
            PrometheusBuilder::new()
                .install_recorder()
                .map_err(|e| DashboardError::Config(format!("Failed to install metrics recorder: {}", e)))
        })
        .map(|_| ())
}

/// Current metrics in Prometheus text exposition format. Empty when no
/// recorder has been installed (tests, fetch-once runs).
pub fn render_metrics() -> String {
    PROMETHEUS.get().map(|h| h.render()).unwrap_or_default()
}

pub mod counters {
    use metrics::counter;

    pub fn fetch_success(responses: u64) {
        counter!("limeboard_fetch_total").increment(1);
        counter!("limeboard_fetched_responses_total").increment(responses);
    }

    pub fn fetch_error() {
        counter!("limeboard_fetch_errors_total").increment(1);
    }

    pub fn refresh_throttled() {
        counter!("limeboard_refresh_throttled_total").increment(1);
    }
}
