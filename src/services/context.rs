use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Deadline and cancellation shared by every stage of one verification.
///
/// Each invocation owns its own context; cancelling one never touches another.
#[derive(Debug, Clone)]
pub struct RequestContext {
    deadline: Instant,
    cancel: CancellationToken,
}

/// Why a guarded operation stopped before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    DeadlineExceeded,
    Cancelled,
}

impl RequestContext {
    pub fn new(timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            cancel,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// A context for a sub-stage that must finish by `budget` from now, but
    /// never later than the parent deadline.
    pub fn narrowed(&self, budget: Duration) -> Self {
        Self {
            deadline: self.deadline.min(Instant::now() + budget),
            cancel: self.cancel.clone(),
        }
    }

    /// Run `fut` unless the deadline passes or the token is cancelled first.
    pub async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, Interrupted> {
        if self.cancel.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupted::Cancelled),
            _ = tokio::time::sleep_until(self.deadline) => Err(Interrupted::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }

    /// Sleep for `delay`, cut short by cancellation or the deadline.
    pub async fn sleep(&self, delay: Duration) -> Result<(), Interrupted> {
        let wake = Instant::now() + delay;
        if wake >= self.deadline {
            return Err(Interrupted::DeadlineExceeded);
        }
        self.guard(tokio::time::sleep_until(wake)).await
    }
}
