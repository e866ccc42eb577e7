//! Classification of FaceCheck.ID upload responses.
//!
//! The upload endpoint has answered with a JSON object, a JSON error envelope,
//! or an HTML page carrying the search id in a link, depending on API version.
//! Each shape is handled by one parse strategy; strategies run in a fixed order
//! and the first one that recognizes the body wins.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex_lite::Regex;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde_json::{Map, Value};

use crate::models::job::JobId;
use crate::models::submission::SubmissionOutcome;
use crate::services::auth::AuthCredential;

/// Upper bound on the diagnostic preview kept from an unrecognized body.
pub const PREVIEW_LIMIT: usize = 500;

const JOB_ID_FIELDS: [&str; 2] = ["id_search", "job_id"];

/// An upstream reply as received, before classification.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

enum ParsedBody<'a> {
    Json(Value),
    Text(Cow<'a, str>),
}

type ParseStrategy = fn(&ParsedBody<'_>) -> Option<SubmissionOutcome>;

/// Ordered: an error envelope beats a job id in the same object.
const STRATEGIES: [(&str, ParseStrategy); 3] = [
    ("json_error", json_error),
    ("json_job_id", json_job_id),
    ("legacy_markup", legacy_job_id),
];

/// Classify an upload response. Consumes the response so the body is dropped
/// here; only a bounded, redacted preview can outlive the call.
pub fn interpret(raw: RawResponse, credential: &AuthCredential) -> SubmissionOutcome {
    let parsed = match serde_json::from_slice::<Value>(&raw.body) {
        Ok(value) => ParsedBody::Json(value),
        Err(_) => ParsedBody::Text(String::from_utf8_lossy(&raw.body)),
    };

    for (name, strategy) in STRATEGIES {
        if let Some(outcome) = strategy(&parsed) {
            tracing::debug!(
                strategy = name,
                http_status = raw.status.as_u16(),
                outcome = outcome.label(),
                "Upload response classified"
            );
            return outcome;
        }
    }

    tracing::warn!(
        http_status = raw.status.as_u16(),
        body_bytes = raw.body.len(),
        content_type = raw
            .headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown"),
        "Upload response not recognized"
    );

    SubmissionOutcome::Unrecognized {
        raw_preview: preview(&raw.body, credential),
    }
}

/// UTF-8 (lossy) rendering of `body`, redacted in full and then cut to
/// [`PREVIEW_LIMIT`] bytes.
pub fn preview(body: &[u8], credential: &AuthCredential) -> String {
    clamp_preview(credential.redact(&String::from_utf8_lossy(body)))
}

/// Truncate to at most [`PREVIEW_LIMIT`] bytes on a char boundary.
pub fn clamp_preview(mut text: String) -> String {
    if text.len() > PREVIEW_LIMIT {
        let mut end = PREVIEW_LIMIT;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}

fn as_object<'a>(parsed: &'a ParsedBody<'_>) -> Option<&'a Map<String, Value>> {
    match parsed {
        ParsedBody::Json(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Render a scalar JSON value as a non-empty string.
pub(crate) fn scalar_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn json_error(parsed: &ParsedBody<'_>) -> Option<SubmissionOutcome> {
    let map = as_object(parsed)?;
    let error = map.get("error")?;

    let (nested_code, message) = match error {
        Value::Null | Value::Bool(false) => return None,
        Value::String(s) if s.trim().is_empty() => return None,
        Value::Object(inner) => (
            inner.get("code").and_then(scalar_string),
            inner.get("message").and_then(scalar_string),
        ),
        Value::Bool(true) => (None, None),
        other => (None, scalar_string(other)),
    };

    let message = message
        .or_else(|| map.get("message").and_then(scalar_string))
        .unwrap_or_else(|| "upstream reported an error".to_string());
    let code = nested_code.or_else(|| map.get("code").and_then(scalar_string));

    Some(SubmissionOutcome::UpstreamRejected { code, message })
}

fn json_job_id(parsed: &ParsedBody<'_>) -> Option<SubmissionOutcome> {
    let map = as_object(parsed)?;
    JOB_ID_FIELDS
        .iter()
        .filter_map(|field| map.get(*field))
        .find_map(|value| match value {
            Value::String(_) | Value::Number(_) => scalar_string(value),
            _ => None,
        })
        .and_then(|id| JobId::parse(&id))
        .map(|job_id| SubmissionOutcome::Accepted { job_id })
}

fn legacy_job_id(parsed: &ParsedBody<'_>) -> Option<SubmissionOutcome> {
    let ParsedBody::Text(text) = parsed else {
        return None;
    };

    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"id_search=(\d+)").expect("valid regex"));

    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| JobId::parse(m.as_str()))
        .map(|job_id| SubmissionOutcome::Accepted { job_id })
}
