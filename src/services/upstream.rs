use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;

use crate::services::encoder::{OutgoingRequest, RequestBody};
use crate::services::interpreter::RawResponse;

/// Largest upstream reply body that will be buffered.
const MAX_RESPONSE_BYTES: usize = 4 * 1024 * 1024;

/// Sends a prepared [`OutgoingRequest`] to FaceCheck.ID.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: OutgoingRequest) -> Result<RawResponse, UpstreamError>;
}

/// `reqwest`-backed transport shared by uploads and status requests.
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, UpstreamError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("face-verify/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(classify)?;

        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: OutgoingRequest) -> Result<RawResponse, UpstreamError> {
        let builder = self
            .http
            .request(request.method, request.url)
            .headers(request.headers);

        let builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(file) => {
                let part = Part::bytes(file.bytes)
                    .file_name(file.file_name)
                    .mime_str(&file.content_type)
                    .map_err(classify)?;
                builder.multipart(Form::new().part(file.name, part))
            }
        };

        let mut response = builder.send().await.map_err(classify)?;
        let status = response.status();
        let headers = response.headers().clone();

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(classify)? {
            if body.len() + chunk.len() > MAX_RESPONSE_BYTES {
                return Err(UpstreamError::ResponseTooLarge {
                    limit_bytes: MAX_RESPONSE_BYTES,
                });
            }
            body.extend_from_slice(&chunk);
        }

        tracing::debug!(
            http_status = status.as_u16(),
            body_bytes = body.len(),
            "FaceCheck responded"
        );

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

/// Error text never includes the request URL, which may carry a query-string secret.
fn classify(err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout
    } else {
        UpstreamError::Transport(err.without_url().to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Response body exceeds {limit_bytes} bytes")]
    ResponseTooLarge { limit_bytes: usize },

    #[error("Unexpected response body: {0}")]
    UnexpectedBody(String),
}
