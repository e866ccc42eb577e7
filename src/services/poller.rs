//! Bounded polling of a FaceCheck.ID search until results are available.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde_json::{json, Map, Value};

use crate::models::job::JobId;
use crate::models::matches::{sort_by_score, MatchRecord, PollOutcome};
use crate::services::auth::{self, AuthCredential};
use crate::services::context::{Interrupted, RequestContext};
use crate::services::encoder::OutgoingRequest;
use crate::services::interpreter::{self, scalar_string};
use crate::services::upstream::{Transport, UpstreamError};

const URL_FIELDS: [&str; 3] = ["url", "source_image_url", "image_url"];

/// Item fields that are never copied into match metadata.
const SKIPPED_FIELDS: [&str; 5] = ["score", "url", "source_image_url", "image_url", "base64"];

/// Delay between status requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed(Duration),
    /// Doubles after each attempt, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// Delay to wait after the given 1-based attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    /// Overall budget for polling; `Duration::ZERO` disables it.
    pub timeout: Duration,
    pub backoff: Backoff,
}

/// One status request for a search.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn status(&self, job_id: &JobId) -> Result<PollOutcome, UpstreamError>;
}

#[derive(Debug, thiserror::Error)]
#[error("Polling was cancelled")]
pub struct PollCancelled;

/// Drives `Pending -> Pending | Complete | Failed` under a deadline.
pub struct ResultPoller<S> {
    source: S,
    settings: PollSettings,
}

impl<S: StatusSource> ResultPoller<S> {
    pub fn new(source: S, settings: PollSettings) -> Self {
        Self { source, settings }
    }

    /// Poll until the search completes, fails, or the deadline passes.
    ///
    /// Running out of time is not an error: the last `Pending` state is
    /// returned so the caller can hand back the job id.
    #[tracing::instrument(skip_all, fields(job_id = %job_id))]
    pub async fn poll(
        &self,
        job_id: &JobId,
        ctx: &RequestContext,
    ) -> Result<PollOutcome, PollCancelled> {
        let ctx = ctx.narrowed(self.settings.timeout);
        let mut last_progress = None;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            metrics::counter!("upstream_poll_attempts_total").increment(1);

            match ctx.guard(self.source.status(job_id)).await {
                Err(Interrupted::Cancelled) => return Err(PollCancelled),
                Err(Interrupted::DeadlineExceeded) => break,
                Ok(Ok(PollOutcome::Pending { progress })) => {
                    last_progress = progress.or(last_progress);
                    tracing::debug!(attempt, progress = ?last_progress, "Search still running");
                }
                Ok(Ok(PollOutcome::Complete { mut matches })) => {
                    sort_by_score(&mut matches);
                    tracing::info!(attempt, matches = matches.len(), "Search complete");
                    return Ok(PollOutcome::Complete { matches });
                }
                Ok(Ok(PollOutcome::Failed { reason })) => {
                    tracing::warn!(attempt, %reason, "Search failed upstream");
                    return Ok(PollOutcome::Failed { reason });
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        attempt,
                        error = %e,
                        "Status request failed, treating as pending"
                    );
                }
            }

            match ctx.sleep(self.settings.backoff.delay(attempt)).await {
                Ok(()) => {}
                Err(Interrupted::Cancelled) => return Err(PollCancelled),
                Err(Interrupted::DeadlineExceeded) => break,
            }
        }

        tracing::info!(attempts = attempt, progress = ?last_progress, "Poll deadline reached");
        Ok(PollOutcome::Pending {
            progress: last_progress,
        })
    }
}

/// Status requests against the FaceCheck.ID search endpoint.
pub struct SearchStatus<T> {
    transport: Arc<T>,
    search_url: Url,
    credential: AuthCredential,
}

impl<T: Transport> SearchStatus<T> {
    pub fn new(transport: Arc<T>, search_url: Url, credential: AuthCredential) -> Self {
        Self {
            transport,
            search_url,
            credential,
        }
    }
}

#[async_trait]
impl<T: Transport> StatusSource for SearchStatus<T> {
    async fn status(&self, job_id: &JobId) -> Result<PollOutcome, UpstreamError> {
        let request = OutgoingRequest::post(self.search_url.clone()).with_json(json!({
            "id_search": job_id.as_str(),
            "with_progress": true,
            "status_only": false,
        }));
        let request = auth::apply(&self.credential, request);

        let response = self.transport.send(request).await?;
        interpret_status(&response.body, &self.credential)
    }
}

/// Classify a search status body.
///
/// `error` means the search failed. An `items` list (top level or under
/// `output`) with at least one usable match means it completed. Anything else,
/// including a list whose items are all malformed, is still pending.
pub fn interpret_status(
    body: &[u8],
    credential: &AuthCredential,
) -> Result<PollOutcome, UpstreamError> {
    let unexpected = || UpstreamError::UnexpectedBody(interpreter::preview(body, credential));
    let value: Value = serde_json::from_slice(body).map_err(|_| unexpected())?;
    let Value::Object(map) = value else {
        return Err(unexpected());
    };

    if let Some(reason) = failure_reason(&map) {
        return Ok(PollOutcome::Failed { reason });
    }

    let items = map
        .get("items")
        .or_else(|| map.get("output").and_then(|o| o.get("items")))
        .and_then(Value::as_array);

    let matches: Vec<MatchRecord> = items
        .map(|items| items.iter().filter_map(normalize_item).collect())
        .unwrap_or_default();
    if !matches.is_empty() {
        return Ok(PollOutcome::Complete { matches });
    }
    if items.is_some_and(|items| !items.is_empty()) {
        tracing::warn!("Status items carried no usable score or image URL");
    }

    let progress = map
        .get("progress")
        .and_then(Value::as_f64)
        .filter(|p| p.is_finite())
        .map(|p| p.clamp(0.0, 100.0).round() as u8);

    Ok(PollOutcome::Pending { progress })
}

fn failure_reason(map: &Map<String, Value>) -> Option<String> {
    let message = match map.get("error")? {
        Value::Object(inner) => inner.get("message").and_then(scalar_string),
        Value::Bool(false) => return None,
        Value::Bool(true) => None,
        other => Some(scalar_string(other)?),
    };
    let message = message
        .or_else(|| map.get("message").and_then(scalar_string))
        .unwrap_or_else(|| "search failed".to_string());

    Some(match map.get("code").and_then(scalar_string) {
        Some(code) => format!("{} (code {})", message, code),
        None => message,
    })
}

/// Turn one upstream item into a [`MatchRecord`]; items without a usable
/// score or image URL are dropped.
fn normalize_item(item: &Value) -> Option<MatchRecord> {
    let obj = item.as_object()?;

    let raw_score = obj.get("score").and_then(Value::as_f64)?;
    if !raw_score.is_finite() {
        return None;
    }
    // FaceCheck reports 0..100; other versions report 0..1.
    let score = if raw_score > 1.0 { raw_score / 100.0 } else { raw_score };

    let source_image_url = URL_FIELDS
        .iter()
        .filter_map(|field| obj.get(*field))
        .find_map(scalar_string)?;

    let metadata: BTreeMap<String, String> = obj
        .iter()
        .filter(|(key, _)| !SKIPPED_FIELDS.contains(&key.as_str()))
        .filter_map(|(key, value)| scalar_string(value).map(|v| (key.clone(), v)))
        .collect();

    Some(MatchRecord {
        score: score.clamp(0.0, 1.0),
        source_image_url,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth::AuthScheme;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    /// Replays scripted outcomes, repeating the last one forever.
    struct ScriptedSource {
        script: Mutex<VecDeque<PollOutcome>>,
        last: Mutex<Option<PollOutcome>>,
        calls: AtomicU32,
    }

    impl ScriptedSource {
        fn new(script: Vec<PollOutcome>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                last: Mutex::new(None),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl StatusSource for ScriptedSource {
        async fn status(&self, _job_id: &JobId) -> Result<PollOutcome, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            if let Some(next) = next {
                *last = Some(next);
            }
            Ok(last.clone().unwrap_or(PollOutcome::Pending { progress: None }))
        }
    }

    fn record(score: f64, url: &str) -> MatchRecord {
        MatchRecord {
            score,
            source_image_url: url.to_string(),
            metadata: BTreeMap::new(),
        }
    }

    fn settings(timeout_secs: u64, interval_secs: u64) -> PollSettings {
        PollSettings {
            timeout: Duration::from_secs(timeout_secs),
            backoff: Backoff::Fixed(Duration::from_secs(interval_secs)),
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::new(Duration::from_secs(60), CancellationToken::new())
    }

    fn status_of(body: &[u8]) -> Result<PollOutcome, UpstreamError> {
        let credential =
            AuthCredential::new(AuthScheme::HeaderNamed, None, "", "s3cr3t-token").unwrap();
        interpret_status(body, &credential)
    }

    fn job() -> JobId {
        JobId::from("789".to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn pending_forever_ends_pending_at_deadline() {
        let source = ScriptedSource::new(vec![PollOutcome::Pending { progress: Some(40) }]);
        let poller = ResultPoller::new(source, settings(10, 2));

        let start = tokio::time::Instant::now();
        let outcome = poller.poll(&job(), &ctx()).await.unwrap();

        assert_eq!(outcome, PollOutcome::Pending { progress: Some(40) });
        assert!(start.elapsed() <= Duration::from_secs(10));
        // Attempts at t = 0, 2, 4, 6, 8.
        assert_eq!(poller.source.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn completes_with_sorted_matches() {
        let source = ScriptedSource::new(vec![
            PollOutcome::Pending { progress: Some(40) },
            PollOutcome::Complete {
                matches: vec![record(0.5, "a"), record(0.92, "b"), record(0.5, "c")],
            },
        ]);
        let poller = ResultPoller::new(source, settings(10, 2));

        let outcome = poller.poll(&job(), &ctx()).await.unwrap();
        let PollOutcome::Complete { matches } = outcome else {
            panic!("expected complete");
        };
        let urls: Vec<_> = matches.iter().map(|m| m.source_image_url.as_str()).collect();
        assert_eq!(urls, vec!["b", "a", "c"]);
        assert_eq!(poller.source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_failure_stops_polling() {
        let source = ScriptedSource::new(vec![PollOutcome::Failed {
            reason: "no faces".to_string(),
        }]);
        let poller = ResultPoller::new(source, settings(10, 2));

        let outcome = poller.poll(&job(), &ctx()).await.unwrap();
        assert_eq!(
            outcome,
            PollOutcome::Failed {
                reason: "no faces".to_string()
            }
        );
        assert_eq!(poller.source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn parent_deadline_bounds_poll_budget() {
        let source = ScriptedSource::new(vec![PollOutcome::Pending { progress: None }]);
        let poller = ResultPoller::new(source, settings(60, 1));
        let parent = RequestContext::new(Duration::from_secs(3), CancellationToken::new());

        let start = tokio::time::Instant::now();
        poller.poll(&job(), &parent).await.unwrap();
        assert!(start.elapsed() <= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_is_reported() {
        let token = CancellationToken::new();
        let source = ScriptedSource::new(vec![PollOutcome::Pending { progress: None }]);
        let poller = ResultPoller::new(source, settings(10, 2));
        let ctx = RequestContext::new(Duration::from_secs(60), token.child_token());
        token.cancel();

        assert!(poller.poll(&job(), &ctx).await.is_err());
    }

    #[test]
    fn exponential_backoff_is_capped() {
        let backoff = Backoff::Exponential {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(5),
        };
        let delays: Vec<_> = (1..=5).map(|a| backoff.delay(a).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 5, 5]);
    }

    #[test]
    fn status_with_progress_is_pending() {
        assert_eq!(
            status_of(br#"{"progress": 40}"#).unwrap(),
            PollOutcome::Pending { progress: Some(40) }
        );
        assert_eq!(
            status_of(br#"{"items": []}"#).unwrap(),
            PollOutcome::Pending { progress: None }
        );
    }

    #[test]
    fn status_with_items_is_complete_and_normalized() {
        let body = br#"{"output": {"items": [
            {"score": 92, "url": "https://a.test/1", "group": 1, "base64": "AAAA"},
            {"score": 0.5, "image_url": "https://b.test/2", "index": "x"},
            {"url": "https://c.test/no-score"}
        ]}}"#;
        let PollOutcome::Complete { matches } = status_of(body).unwrap() else {
            panic!("expected complete");
        };

        assert_eq!(matches.len(), 2);
        assert!((matches[0].score - 0.92).abs() < 1e-9);
        assert_eq!(matches[0].source_image_url, "https://a.test/1");
        assert_eq!(matches[0].metadata.get("group").map(String::as_str), Some("1"));
        assert!(!matches[0].metadata.contains_key("base64"));
        assert_eq!(matches[1].source_image_url, "https://b.test/2");
    }

    #[test]
    fn status_error_is_failure() {
        assert_eq!(
            status_of(br#"{"error": "Search expired", "code": "EXPIRED"}"#).unwrap(),
            PollOutcome::Failed {
                reason: "Search expired (code EXPIRED)".to_string()
            }
        );
        assert_eq!(
            status_of(br#"{"error": null, "progress": 10}"#).unwrap(),
            PollOutcome::Pending { progress: Some(10) }
        );
    }

    #[test]
    fn non_json_status_is_an_error() {
        assert!(matches!(
            status_of(b"<html>busy</html>"),
            Err(UpstreamError::UnexpectedBody(_))
        ));
    }

    #[test]
    fn items_without_usable_matches_stay_pending() {
        assert_eq!(
            status_of(br#"{"items": [{"url": "x"}, {"score": "high"}], "progress": 90}"#)
                .unwrap(),
            PollOutcome::Pending { progress: Some(90) }
        );
    }

    #[test]
    fn unexpected_status_body_is_redacted() {
        let Err(UpstreamError::UnexpectedBody(preview)) =
            status_of(b"<html>bad token s3cr3t-token</html>")
        else {
            panic!("expected unexpected body");
        };
        assert_eq!(preview, "<html>bad token ***</html>");
    }
}
