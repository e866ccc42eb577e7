//! Fetch -> encode -> upload -> interpret -> poll, with failures mapped onto
//! the caller-facing taxonomy.

use std::sync::Arc;

use reqwest::Url;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::VerifyError;
use crate::models::job::JobId;
use crate::models::matches::PollOutcome;
use crate::models::submission::SubmissionOutcome;
use crate::models::verification::{VerificationRequest, VerificationResult};
use crate::services::auth::AuthCredential;
use crate::services::context::{Interrupted, RequestContext};
use crate::services::encoder;
use crate::services::fetcher::{FetchError, ResourceFetcher};
use crate::services::interpreter::{self, clamp_preview};
use crate::services::poller::{PollSettings, ResultPoller, SearchStatus};
use crate::services::upstream::{Transport, UpstreamError};

/// FaceCheck.ID endpoints used by the pipeline.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub upload_url: Url,
    pub search_url: Url,
    /// Prefix of the human-facing results page; the job id is appended as
    /// one path segment.
    pub results_base_url: Url,
}

impl Endpoints {
    pub fn results_reference(&self, job_id: &JobId) -> String {
        let mut url = self.results_base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(job_id.as_str());
        }
        url.into()
    }
}

/// One linear verification per call; holds no per-request state, so a single
/// instance serves concurrent requests.
pub struct VerificationPipeline<F, T> {
    fetcher: F,
    transport: Arc<T>,
    endpoints: Endpoints,
    credential: AuthCredential,
    poll: PollSettings,
}

impl<F: ResourceFetcher, T: Transport> VerificationPipeline<F, T> {
    pub fn new(
        fetcher: F,
        transport: Arc<T>,
        endpoints: Endpoints,
        credential: AuthCredential,
        poll: PollSettings,
    ) -> Self {
        Self {
            fetcher,
            transport,
            endpoints,
            credential,
            poll,
        }
    }

    pub fn credential(&self) -> &AuthCredential {
        &self.credential
    }

    /// Run the whole pipeline for one caller-supplied locator.
    pub async fn verify(&self, source_locator: &str, ctx: &RequestContext) -> VerificationResult {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("verification", %request_id);
        let started = std::time::Instant::now();

        let result = self.run(source_locator, ctx).instrument(span.clone()).await;

        metrics::counter!("verification_requests_total", "status" => result.status.to_string())
            .increment(1);
        metrics::histogram!("verification_pipeline_seconds")
            .record(started.elapsed().as_secs_f64());

        let error_kind = result
            .error
            .as_ref()
            .map(|e| e.kind.to_string())
            .unwrap_or_default();
        span.in_scope(|| {
            tracing::info!(
                status = %result.status,
                job_id = result.job_id.as_ref().map(JobId::as_str).unwrap_or_default(),
                error_kind = %error_kind,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Verification finished"
            )
        });

        result
    }

    /// Retrieve results for a job id obtained by an earlier verification.
    pub async fn lookup(&self, job_id: JobId, ctx: &RequestContext) -> VerificationResult {
        let span = tracing::info_span!("result_lookup", job_id = %job_id);
        let settings = if self.poll.timeout.is_zero() {
            PollSettings {
                timeout: ctx.remaining(),
                ..self.poll
            }
        } else {
            self.poll
        };

        self.collect_results(job_id, settings, ctx)
            .instrument(span)
            .await
    }

    async fn run(&self, source_locator: &str, ctx: &RequestContext) -> VerificationResult {
        let request = match VerificationRequest::parse(source_locator) {
            Ok(request) => request,
            Err(err) => {
                tracing::info!(error = %err, "Rejected locator before any network call");
                return VerificationResult::from_error(None, &err);
            }
        };

        let resource = match self.fetcher.fetch(&request.source_locator, ctx).await {
            Ok(resource) => resource,
            Err(err) => return VerificationResult::from_error(None, &self.fetch_error(err)),
        };

        let upload = encoder::encode(&self.endpoints.upload_url, resource, &self.credential);

        let raw = match ctx.guard(self.transport.send(upload)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(err)) => {
                return VerificationResult::from_error(None, &self.upstream_error(err));
            }
            Err(Interrupted::DeadlineExceeded) => {
                return VerificationResult::from_error(
                    None,
                    &VerifyError::UpstreamUnavailable(
                        "upload did not finish before the deadline".into(),
                    ),
                );
            }
            Err(Interrupted::Cancelled) => {
                return VerificationResult::from_error(None, &VerifyError::Cancelled);
            }
        };

        let outcome = interpreter::interpret(raw, &self.credential);
        metrics::counter!("upstream_interpret_total", "outcome" => outcome.label()).increment(1);

        let job_id = match outcome {
            SubmissionOutcome::Accepted { job_id } => job_id,
            SubmissionOutcome::UpstreamRejected { code, message } => {
                let err = VerifyError::UpstreamRejected {
                    code: code.map(|c| self.bounded(&c)),
                    message: self.bounded(&message),
                };
                return VerificationResult::from_error(None, &err);
            }
            SubmissionOutcome::Unrecognized { raw_preview } => {
                let err = VerifyError::UpstreamUnrecognized { raw_preview };
                return VerificationResult::from_error(None, &err);
            }
        };

        tracing::info!(job_id = %job_id, "FaceCheck accepted the upload");

        if self.poll.timeout.is_zero() {
            let reference = self.endpoints.results_reference(&job_id);
            return VerificationResult::accepted(job_id, reference, None);
        }

        self.collect_results(job_id, self.poll, ctx).await
    }

    async fn collect_results(
        &self,
        job_id: JobId,
        settings: PollSettings,
        ctx: &RequestContext,
    ) -> VerificationResult {
        let reference = self.endpoints.results_reference(&job_id);
        let source = SearchStatus::new(
            Arc::clone(&self.transport),
            self.endpoints.search_url.clone(),
            self.credential.clone(),
        );
        let poller = ResultPoller::new(source, settings);

        match poller.poll(&job_id, ctx).await {
            Ok(PollOutcome::Complete { matches }) => {
                VerificationResult::accepted(job_id, reference, Some(matches))
            }
            Ok(PollOutcome::Pending { progress }) => {
                VerificationResult::from_error(Some((job_id, reference)), &VerifyError::PollTimeout)
                    .with_progress(progress)
            }
            Ok(PollOutcome::Failed { reason }) => VerificationResult::from_error(
                Some((job_id, reference)),
                &VerifyError::PollFailed(self.bounded(&reason)),
            ),
            Err(_) => {
                VerificationResult::from_error(Some((job_id, reference)), &VerifyError::Cancelled)
            }
        }
    }

    /// Upstream-supplied text as it may reach the caller: redacted, then bounded.
    fn bounded(&self, text: &str) -> String {
        clamp_preview(self.credential.redact(text))
    }

    fn fetch_error(&self, err: FetchError) -> VerifyError {
        match err {
            FetchError::InvalidLocator(reason) => VerifyError::InvalidLocator(reason),
            FetchError::Status { status_code } => VerifyError::DownloadFailed {
                status_code: Some(status_code),
                message: String::new(),
            },
            FetchError::Timeout => VerifyError::DownloadTimeout,
            FetchError::TooLarge { limit_bytes } => VerifyError::DownloadTooLarge { limit_bytes },
            FetchError::Transport(message) => VerifyError::DownloadFailed {
                status_code: None,
                message: self.bounded(&message),
            },
            FetchError::Cancelled => VerifyError::Cancelled,
        }
    }

    fn upstream_error(&self, err: UpstreamError) -> VerifyError {
        VerifyError::UpstreamUnavailable(self.bounded(&err.to_string()))
    }
}
