use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};

use crate::models::submission::FetchedResource;
use crate::services::context::{Interrupted, RequestContext};

/// Validate a caller-supplied locator without touching the network.
///
/// Only absolute `http`/`https` URLs with a host are accepted.
pub fn parse_locator(raw: &str) -> Result<Url, FetchError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(FetchError::InvalidLocator("locator is empty".to_string()));
    }

    let url = Url::parse(raw).map_err(|e| FetchError::InvalidLocator(e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(FetchError::InvalidLocator(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(FetchError::InvalidLocator("locator has no host".to_string()));
    }

    Ok(url)
}

/// Retrieves the raw bytes behind a validated locator.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(
        &self,
        locator: &Url,
        ctx: &RequestContext,
    ) -> Result<FetchedResource, FetchError>;
}

/// Single-shot HTTP GET with a timeout and a byte cap. Never retries.
pub struct HttpFetcher {
    http: Client,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, max_bytes: u64) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("face-verify/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(classify)?;

        Ok(Self { http, max_bytes })
    }

    async fn download(&self, locator: &Url) -> Result<FetchedResource, FetchError> {
        let mut response = self
            .http
            .get(locator.clone())
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status_code: status.as_u16(),
            });
        }

        if let Some(declared) = response.content_length() {
            if declared > self.max_bytes {
                return Err(FetchError::TooLarge {
                    limit_bytes: self.max_bytes,
                });
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let capacity = response.content_length().unwrap_or(0).min(self.max_bytes);
        let mut bytes = Vec::with_capacity(capacity as usize);

        // Content-Length can be absent or wrong, so the cap is enforced per chunk.
        while let Some(chunk) = response.chunk().await.map_err(classify)? {
            if (bytes.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(FetchError::TooLarge {
                    limit_bytes: self.max_bytes,
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(FetchedResource::new(bytes, content_type))
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    #[tracing::instrument(skip_all, fields(host = locator.host_str().unwrap_or_default()))]
    async fn fetch(
        &self,
        locator: &Url,
        ctx: &RequestContext,
    ) -> Result<FetchedResource, FetchError> {
        let resource = match ctx.guard(self.download(locator)).await {
            Ok(result) => result?,
            Err(Interrupted::DeadlineExceeded) => return Err(FetchError::Timeout),
            Err(Interrupted::Cancelled) => return Err(FetchError::Cancelled),
        };

        tracing::info!(
            size_bytes = resource.size_bytes,
            content_type = resource.content_type.as_deref().unwrap_or("unknown"),
            "Image downloaded"
        );

        Ok(resource)
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport(err.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    #[error("Remote host returned HTTP {status_code}")]
    Status { status_code: u16 },

    #[error("Download timed out")]
    Timeout,

    #[error("Download exceeds {limit_bytes} bytes")]
    TooLarge { limit_bytes: u64 },

    #[error("Download failed: {0}")]
    Transport(String),

    #[error("Download cancelled")]
    Cancelled,
}
