use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub upstream: UpstreamInfo,
}

/// Non-secret view of how the upstream is configured.
#[derive(Serialize)]
pub struct UpstreamInfo {
    pub auth_scheme: String,
    pub auth_name: String,
    pub request_timeout_secs: u64,
}

/// GET /health — liveness plus the active auth scheme (never the secret).
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let credential = state.pipeline.credential();

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        upstream: UpstreamInfo {
            auth_scheme: credential.scheme().to_string(),
            auth_name: credential.name().to_string(),
            request_timeout_secs: state.request_timeout.as_secs(),
        },
    })
}
