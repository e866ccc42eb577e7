use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use crate::services::auth::{AuthCredential, AuthError, AuthScheme};
use crate::services::orchestrator::Endpoints;
use crate::services::poller::{Backoff, PollSettings};

/// Shortest delay allowed between status requests.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollBackoffKind {
    Fixed,
    Exponential,
}

#[derive(Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// FaceCheck.ID API secret. Never logged.
    pub facecheck_api_token: String,

    /// How the secret is attached to upstream requests
    #[serde(default = "default_auth_scheme")]
    pub facecheck_auth_scheme: AuthScheme,

    /// Header name, or query parameter name for `query_param`
    pub facecheck_auth_header: Option<String>,

    /// Prefix for `bearer_prefixed`
    #[serde(default = "default_auth_prefix")]
    pub facecheck_auth_prefix: String,

    #[serde(default = "default_upload_url")]
    pub facecheck_upload_url: String,

    #[serde(default = "default_search_url")]
    pub facecheck_search_url: String,

    /// Human-facing results page prefix; the job id is appended
    #[serde(default = "default_results_base_url")]
    pub facecheck_results_base_url: String,

    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,

    #[serde(default = "default_download_max_bytes")]
    pub download_max_bytes: u64,

    #[serde(default = "default_upload_timeout_secs")]
    pub upload_timeout_secs: u64,

    /// Deadline for one whole verification request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// In-request polling budget; 0 returns right after the upload is accepted
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_poll_backoff")]
    pub poll_backoff: PollBackoffKind,

    #[serde(default = "default_poll_max_interval_ms")]
    pub poll_max_interval_ms: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_auth_scheme() -> AuthScheme {
    AuthScheme::HeaderNamed
}

fn default_auth_prefix() -> String {
    "Bearer".to_string()
}

fn default_upload_url() -> String {
    "https://facecheck.id/api/upload_pic".to_string()
}

fn default_search_url() -> String {
    "https://facecheck.id/api/search".to_string()
}

fn default_results_base_url() -> String {
    "https://facecheck.id/search/".to_string()
}

fn default_download_timeout_secs() -> u64 {
    20
}

fn default_download_max_bytes() -> u64 {
    20 * 1024 * 1024
}

fn default_upload_timeout_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    25
}

fn default_poll_timeout_secs() -> u64 {
    10
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_poll_backoff() -> PollBackoffKind {
    PollBackoffKind::Fixed
}

fn default_poll_max_interval_ms() -> u64 {
    8000
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Ok(envy::from_env()?)
    }

    /// Build from explicit key/value pairs (upper-case keys, as in the environment).
    pub fn from_pairs<I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Ok(envy::from_iter(pairs)?)
    }

    pub fn auth_credential(&self) -> Result<AuthCredential, ConfigError> {
        Ok(AuthCredential::new(
            self.facecheck_auth_scheme,
            self.facecheck_auth_header.as_deref(),
            &self.facecheck_auth_prefix,
            &self.facecheck_api_token,
        )?)
    }

    pub fn endpoints(&self) -> Result<Endpoints, ConfigError> {
        Ok(Endpoints {
            upload_url: parse_url("FACECHECK_UPLOAD_URL", &self.facecheck_upload_url)?,
            search_url: parse_url("FACECHECK_SEARCH_URL", &self.facecheck_search_url)?,
            results_base_url: parse_url(
                "FACECHECK_RESULTS_BASE_URL",
                &self.facecheck_results_base_url,
            )?,
        })
    }

    pub fn poll_settings(&self) -> PollSettings {
        let interval = Duration::from_millis(self.poll_interval_ms).max(MIN_POLL_INTERVAL);
        let backoff = match self.poll_backoff {
            PollBackoffKind::Fixed => Backoff::Fixed(interval),
            PollBackoffKind::Exponential => Backoff::Exponential {
                initial: interval,
                max: Duration::from_millis(self.poll_max_interval_ms).max(interval),
            },
        };

        PollSettings {
            timeout: Duration::from_secs(self.poll_timeout_secs),
            backoff,
        }
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("facecheck_auth_scheme", &self.facecheck_auth_scheme)
            .field("facecheck_upload_url", &self.facecheck_upload_url)
            .field("facecheck_search_url", &self.facecheck_search_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish_non_exhaustive()
    }
}

fn parse_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        key,
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            key,
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(url)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid FaceCheck credential: {0}")]
    Auth(#[from] AuthError),

    #[error("Invalid URL in {key}: {reason}")]
    InvalidUrl { key: &'static str, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}
