//! Failure taxonomy shared by the pipeline and the HTTP layer.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Machine-readable error category carried in every error payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    InvalidLocator,
    DownloadFailed,
    DownloadTimeout,
    DownloadTooLarge,
    UpstreamUnavailable,
    UpstreamRejected,
    UpstreamUnrecognized,
    PollTimeout,
    PollFailed,
    Cancelled,
}

impl ErrorKind {
    pub fn http_status(self) -> StatusCode {
        match self {
            ErrorKind::InvalidLocator => StatusCode::BAD_REQUEST,
            ErrorKind::DownloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorKind::DownloadTimeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::PollTimeout => StatusCode::OK,
            ErrorKind::DownloadFailed
            | ErrorKind::UpstreamUnavailable
            | ErrorKind::UpstreamRejected
            | ErrorKind::UpstreamUnrecognized
            | ErrorKind::PollFailed => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Every way a verification can end short of a completed match set.
///
/// Messages are built from already-redacted text and are safe to return to callers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VerifyError {
    #[error("Invalid image locator: {0}")]
    InvalidLocator(String),

    #[error("Image download failed{}", status_suffix(.status_code))]
    DownloadFailed { status_code: Option<u16>, message: String },

    #[error("Image download timed out")]
    DownloadTimeout,

    #[error("Image exceeds the {limit_bytes} byte download limit")]
    DownloadTooLarge { limit_bytes: u64 },

    #[error("FaceCheck request failed: {0}")]
    UpstreamUnavailable(String),

    #[error("FaceCheck rejected the upload: {message}")]
    UpstreamRejected { code: Option<String>, message: String },

    #[error("FaceCheck returned an unrecognized response")]
    UpstreamUnrecognized { raw_preview: String },

    #[error("Search results were not ready before the deadline")]
    PollTimeout,

    #[error("FaceCheck reported the search failed: {0}")]
    PollFailed(String),

    #[error("Verification was cancelled")]
    Cancelled,
}

fn status_suffix(status_code: &Option<u16>) -> String {
    status_code
        .map(|code| format!(" with HTTP {}", code))
        .unwrap_or_default()
}

impl VerifyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VerifyError::InvalidLocator(_) => ErrorKind::InvalidLocator,
            VerifyError::DownloadFailed { .. } => ErrorKind::DownloadFailed,
            VerifyError::DownloadTimeout => ErrorKind::DownloadTimeout,
            VerifyError::DownloadTooLarge { .. } => ErrorKind::DownloadTooLarge,
            VerifyError::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            VerifyError::UpstreamRejected { .. } => ErrorKind::UpstreamRejected,
            VerifyError::UpstreamUnrecognized { .. } => ErrorKind::UpstreamUnrecognized,
            VerifyError::PollTimeout => ErrorKind::PollTimeout,
            VerifyError::PollFailed(_) => ErrorKind::PollFailed,
            VerifyError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Caller-facing message, including the diagnostic detail each variant carries.
    pub fn message(&self) -> String {
        match self {
            VerifyError::DownloadFailed { message, .. } if !message.is_empty() => {
                format!("{}: {}", self, message)
            }
            VerifyError::UpstreamRejected {
                code: Some(code), ..
            } => format!("{} (code {})", self, code),
            VerifyError::UpstreamUnrecognized { raw_preview } => {
                format!("{}; preview: {}", self, raw_preview)
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_http_statuses() {
        assert_eq!(
            VerifyError::InvalidLocator("x".into()).kind().http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(VerifyError::PollTimeout.kind().http_status(), StatusCode::OK);
        assert_eq!(
            VerifyError::DownloadTooLarge { limit_bytes: 1 }.kind().http_status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn messages_carry_detail() {
        let err = VerifyError::DownloadFailed {
            status_code: Some(404),
            message: String::new(),
        };
        assert_eq!(err.message(), "Image download failed with HTTP 404");

        let err = VerifyError::UpstreamRejected {
            code: Some("INVALID_TOKEN".into()),
            message: "bad token".into(),
        };
        assert_eq!(
            err.message(),
            "FaceCheck rejected the upload: bad token (code INVALID_TOKEN)"
        );
    }

    #[test]
    fn kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ErrorKind::UpstreamUnrecognized).unwrap(),
            "\"upstream_unrecognized\""
        );
    }
}
