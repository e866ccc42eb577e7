//! Test helpers: mock image host, mock FaceCheck API, and router plumbing
#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use face_verify::app_state::AppState;
use face_verify::config::AppConfig;
use face_verify::routes;

use crate::fixtures::{self, API_TOKEN};

/// Mock image host plus mock FaceCheck API.
pub struct TestEnv {
    pub images: MockServer,
    pub facecheck: MockServer,
}

impl TestEnv {
    pub async fn start() -> Self {
        Self {
            images: MockServer::start().await,
            facecheck: MockServer::start().await,
        }
    }

    pub fn image_url(&self, name: &str) -> String {
        format!("{}/{}", self.images.uri(), name)
    }

    /// Configuration pointing at the mocks, with fast polling.
    pub fn config(&self, overrides: &[(&str, &str)]) -> AppConfig {
        let base = self.facecheck.uri();
        let mut pairs: Vec<(String, String)> = vec![
            ("FACECHECK_API_TOKEN".into(), API_TOKEN.into()),
            ("FACECHECK_UPLOAD_URL".into(), format!("{}/api/upload_pic", base)),
            ("FACECHECK_SEARCH_URL".into(), format!("{}/api/search", base)),
            ("FACECHECK_RESULTS_BASE_URL".into(), format!("{}/search/", base)),
            ("POLL_INTERVAL_MS".into(), "10".into()),
            ("POLL_TIMEOUT_SECS".into(), "2".into()),
            ("REQUEST_TIMEOUT_SECS".into(), "10".into()),
            ("DOWNLOAD_TIMEOUT_SECS".into(), "5".into()),
        ];
        for (key, value) in overrides {
            pairs.retain(|(k, _)| k != key);
            pairs.push((key.to_string(), value.to_string()));
        }
        AppConfig::from_pairs(pairs).expect("valid test configuration")
    }

    pub fn router(&self, overrides: &[(&str, &str)]) -> Router {
        let state = AppState::from_config(&self.config(overrides), CancellationToken::new())
            .expect("Failed to build app state");
        routes::router(state)
    }

    /// Serve a JPEG at `/face.jpg` on the image host.
    pub async fn serve_image(&self) {
        Mock::given(method("GET"))
            .and(path("/face.jpg"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(fixtures::jpeg_bytes(), "image/jpeg"),
            )
            .mount(&self.images)
            .await;
    }

    pub async fn upload_responds(&self, status: u16, body: &str) {
        Mock::given(method("POST"))
            .and(path("/api/upload_pic"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.facecheck)
            .await;
    }

    /// Status responses for one search id, in order; the last one repeats.
    pub async fn search_responds(&self, job_id: &str, bodies: &[&str]) {
        let Some((last, first)) = bodies.split_last() else {
            return;
        };
        for body in first {
            Mock::given(method("POST"))
                .and(path("/api/search"))
                .and(body_partial_json(serde_json::json!({ "id_search": job_id })))
                .respond_with(ResponseTemplate::new(200).set_body_string(*body))
                .up_to_n_times(1)
                .mount(&self.facecheck)
                .await;
        }
        Mock::given(method("POST"))
            .and(path("/api/search"))
            .and(body_partial_json(serde_json::json!({ "id_search": job_id })))
            .respond_with(ResponseTemplate::new(200).set_body_string(*last))
            .mount(&self.facecheck)
            .await;
    }

    /// Requests the mock FaceCheck API received on `route`.
    pub async fn facecheck_requests(&self, route: &str) -> Vec<wiremock::Request> {
        self.facecheck
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == route)
            .collect()
    }
}

/// POST /api/v1/verify with a raw JSON body.
pub async fn post_verify(app: Router, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/verify")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid request");
    send(app, request).await
}

pub async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("valid request");
    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

/// Scores of the returned matches, in order.
pub fn scores(result: &Value) -> Vec<f64> {
    result["matches"]
        .as_array()
        .map(|items| items.iter().filter_map(|m| m["score"].as_f64()).collect())
        .unwrap_or_default()
}
