use crate::models::job::JobId;

/// Image bytes downloaded from the caller's locator. Lives only until encoded.
#[derive(Debug, Clone)]
pub struct FetchedResource {
    pub bytes: Vec<u8>,
    /// `Content-Type` declared by the remote host, if any.
    pub content_type: Option<String>,
    pub size_bytes: usize,
}

impl FetchedResource {
    pub fn new(bytes: Vec<u8>, content_type: Option<String>) -> Self {
        let size_bytes = bytes.len();
        Self {
            bytes,
            content_type,
            size_bytes,
        }
    }
}

/// Classification of one upload response.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    Accepted { job_id: JobId },
    UpstreamRejected { code: Option<String>, message: String },
    Unrecognized { raw_preview: String },
}

impl SubmissionOutcome {
    /// Short label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            SubmissionOutcome::Accepted { .. } => "accepted",
            SubmissionOutcome::UpstreamRejected { .. } => "rejected",
            SubmissionOutcome::Unrecognized { .. } => "unrecognized",
        }
    }
}
