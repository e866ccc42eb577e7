use garde::Validate;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, VerifyError};
use crate::models::job::{JobId, JobStatus};
use crate::models::matches::MatchRecord;
use crate::services::fetcher::{self, FetchError};

/// Body of `POST /api/v1/verify`.
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyRequest {
    #[serde(default)]
    #[garde(length(min = 1, max = 2048))]
    pub image_url: String,
}

/// A validated request for one pipeline invocation.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub source_locator: Url,
}

impl VerificationRequest {
    pub fn parse(raw: &str) -> Result<Self, VerifyError> {
        match fetcher::parse_locator(raw) {
            Ok(source_locator) => Ok(Self { source_locator }),
            Err(FetchError::InvalidLocator(reason)) => Err(VerifyError::InvalidLocator(reason)),
            Err(other) => Err(VerifyError::InvalidLocator(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&VerifyError> for ErrorBody {
    fn from(err: &VerifyError) -> Self {
        Self {
            kind: err.kind(),
            message: err.message(),
        }
    }
}

/// Normalized outcome of one verification, returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matches: Option<Vec<MatchRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl VerificationResult {
    /// Job accepted; matches are present once the search has completed.
    pub fn accepted(
        job_id: JobId,
        results_reference: String,
        matches: Option<Vec<MatchRecord>>,
    ) -> Self {
        Self {
            status: JobStatus::Accepted,
            job_id: Some(job_id),
            results_reference: Some(results_reference),
            matches,
            progress: None,
            error: None,
        }
    }

    /// Any error outcome. A job id obtained earlier is kept so the caller can
    /// retrieve results out of band.
    pub fn from_error(job: Option<(JobId, String)>, err: &VerifyError) -> Self {
        let status = match err.kind() {
            ErrorKind::UpstreamRejected => JobStatus::Rejected,
            ErrorKind::PollTimeout => JobStatus::Pending,
            _ => JobStatus::Failed,
        };
        let (job_id, results_reference) = match job {
            Some((id, reference)) => (Some(id), Some(reference)),
            None => (None, None),
        };

        Self {
            status,
            job_id,
            results_reference,
            matches: None,
            progress: None,
            error: Some(ErrorBody::from(err)),
        }
    }

    pub fn with_progress(mut self, progress: Option<u8>) -> Self {
        self.progress = progress;
        self
    }

    /// HTTP status the route layer answers with.
    pub fn http_status(&self) -> axum::http::StatusCode {
        self.error
            .as_ref()
            .map(|e| e.kind.http_status())
            .unwrap_or(axum::http::StatusCode::OK)
    }
}
