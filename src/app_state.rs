use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, ConfigError};
use crate::services::{
    context::RequestContext, fetcher::HttpFetcher, orchestrator::VerificationPipeline,
    upstream::HttpTransport,
};

/// The production pipeline: HTTP download, HTTP upstream.
pub type Pipeline = VerificationPipeline<HttpFetcher, HttpTransport>;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub request_timeout: Duration,
    /// Cancelled on shutdown; every request works under a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(pipeline: Pipeline, request_timeout: Duration, shutdown: CancellationToken) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            request_timeout,
            shutdown,
        }
    }

    /// Wire the pipeline from configuration. Fails fast on any invalid setting.
    pub fn from_config(
        config: &AppConfig,
        shutdown: CancellationToken,
    ) -> Result<Self, ConfigError> {
        let credential = config.auth_credential()?;
        let endpoints = config.endpoints()?;

        let fetcher = HttpFetcher::new(config.download_timeout(), config.download_max_bytes)
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        let transport = HttpTransport::new(config.upload_timeout())
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        let pipeline = VerificationPipeline::new(
            fetcher,
            Arc::new(transport),
            endpoints,
            credential,
            config.poll_settings(),
        );

        Ok(Self::new(pipeline, config.request_timeout(), shutdown))
    }

    /// Fresh deadline and cancellation scope for one request.
    pub fn request_context(&self) -> RequestContext {
        RequestContext::new(self.request_timeout, self.shutdown.child_token())
    }
}
