use std::sync::Arc;
use std::time::Duration;

use crate::http_client::HttpResponse;

/// Decides whether the outcome of one attempt warrants another try.
pub type RetryPredicate =
    Arc<dyn Fn(Option<&HttpResponse>, Option<&reqwest::Error>) -> bool + Send + Sync>;

/// Per-call retry behavior: a predicate plus an escalating backoff table,
/// one sleep per retry attempt.
#[derive(Clone)]
pub struct RetryOptions {
    pub should_retry: RetryPredicate,
    pub intervals: Vec<Duration>,
}

impl RetryOptions {
    pub fn new(should_retry: RetryPredicate, intervals: Vec<Duration>) -> Self {
        Self {
            should_retry,
            intervals,
        }
    }

    /// Keeps the default predicate but swaps the backoff table.
    pub fn with_intervals(intervals: Vec<Duration>) -> Self {
        Self {
            should_retry: Arc::new(default_should_retry),
            intervals,
        }
    }

    /// Never retries.
    pub fn none() -> Self {
        Self::with_intervals(Vec::new())
    }
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            should_retry: Arc::new(default_should_retry),
            intervals: default_intervals(),
        }
    }
}

impl std::fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryOptions")
            .field("intervals", &self.intervals)
            .finish_non_exhaustive()
    }
}

/// Default classification: retry on transport errors and on server
/// overload/error (5xx or 429), never on a definitive 4xx.
pub fn default_should_retry(
    response: Option<&HttpResponse>,
    error: Option<&reqwest::Error>,
) -> bool {
    if error.is_some() {
        return true;
    }
    match response {
        Some(response) => {
            let status = response.status.as_u16();
            status >= 500 || status == 429
        }
        None => true,
    }
}

/// The default backoff table: ~2.5 minutes worst case over 9 retries.
pub fn default_intervals() -> Vec<Duration> {
    vec![
        Duration::from_millis(250),
        Duration::from_millis(500),
        Duration::from_secs(1),
        Duration::from_secs(2),
        Duration::from_secs(5),
        Duration::from_secs(15),
        Duration::from_secs(30),
        Duration::from_secs(45),
        Duration::from_secs(60),
    ]
}
