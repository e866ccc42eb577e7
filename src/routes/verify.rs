use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::error::VerifyError;
use crate::models::job::JobId;
use crate::models::verification::{VerificationResult, VerifyRequest};

type VerifyReply = (StatusCode, Json<VerificationResult>);

fn reply(result: VerificationResult) -> VerifyReply {
    (result.http_status(), Json(result))
}

fn invalid(message: impl Into<String>) -> VerifyReply {
    reply(VerificationResult::from_error(
        None,
        &VerifyError::InvalidLocator(message.into()),
    ))
}

/// POST /api/v1/verify — submit an image URL for a face search.
pub async fn submit_verification(
    State(state): State<AppState>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> VerifyReply {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return invalid(rejection.body_text()),
    };

    if let Err(report) = request.validate() {
        return invalid(format!("image_url is required: {}", report));
    }

    let ctx = state.request_context();
    reply(state.pipeline.verify(&request.image_url, &ctx).await)
}

/// GET /api/v1/verify/{job_id} — retrieve results for an earlier submission.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> VerifyReply {
    let Some(job_id) = JobId::parse(&job_id) else {
        return invalid("job id must be 1-128 characters of [A-Za-z0-9_-]");
    };

    let ctx = state.request_context();
    reply(state.pipeline.lookup(job_id, &ctx).await)
}
