use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder and register pipeline metrics.
pub fn install_recorder() -> Result<Arc<PrometheusHandle>, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    metrics::describe_counter!(
        "verification_requests_total",
        "Verifications finished, labelled by final status"
    );
    metrics::describe_histogram!(
        "verification_pipeline_seconds",
        "Wall time of one verification from locator to result"
    );
    metrics::describe_counter!(
        "upstream_poll_attempts_total",
        "Status requests sent to FaceCheck"
    );
    metrics::describe_counter!(
        "upstream_interpret_total",
        "Upload responses by classified outcome"
    );

    Ok(Arc::new(handle))
}

/// GET /metrics — Prometheus text exposition.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}
