//! Retry policy for outbound platform calls.
//!
//! Two kinds of failure are worth retrying:
//!
//! - `429 Too Many Requests` waits through the rate-limit schedule;
//! - `400 Bad Request` whose message contains `not.processed` means an uploaded
//!   attachment is still being processed and waits through the upload schedule.
//!
//! The schedule is chosen by the first failure. Each later failure that is
//! still retryable consumes the next interval; any other failure is returned
//! immediately. Once the schedule is exhausted the last error is returned, so
//! a schedule of `N` intervals allows at most `N + 1` attempts.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};

/// Waits applied to `429` responses.
pub const DEFAULT_RATE_LIMIT_INTERVALS: [Duration; 4] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(5),
    Duration::from_secs(10),
];

/// Waits applied to `400 ... not.processed` responses.
pub const DEFAULT_UPLOAD_RETRY_INTERVALS: [Duration; 4] = [
    Duration::from_millis(200),
    Duration::from_millis(500),
    Duration::from_secs(1),
    Duration::from_secs(2),
];

const STATUS_BAD_REQUEST: u16 = 400;
const STATUS_TOO_MANY_REQUESTS: u16 = 429;
const NOT_PROCESSED_MARKER: &str = "not.processed";

/// Wait schedules for retryable platform errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Schedule for rate-limited calls.
    pub rate_limit_intervals: Vec<Duration>,
    /// Schedule for attachments that are not processed yet.
    pub upload_retry_intervals: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            rate_limit_intervals: DEFAULT_RATE_LIMIT_INTERVALS.to_vec(),
            upload_retry_intervals: DEFAULT_UPLOAD_RETRY_INTERVALS.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self {
            rate_limit_intervals: Vec::new(),
            upload_retry_intervals: Vec::new(),
        }
    }

    /// Sets the rate-limit schedule.
    pub fn with_rate_limit_intervals(mut self, intervals: impl Into<Vec<Duration>>) -> Self {
        self.rate_limit_intervals = intervals.into();
        self
    }

    /// Sets the upload schedule.
    pub fn with_upload_retry_intervals(mut self, intervals: impl Into<Vec<Duration>>) -> Self {
        self.upload_retry_intervals = intervals.into();
        self
    }

    /// Returns the schedule for `err`, or `None` if it is not retryable.
    pub fn intervals_for(&self, err: &ApiError) -> Option<&[Duration]> {
        let ApiError::Api { status, message } = err else {
            return None;
        };

        match *status {
            STATUS_TOO_MANY_REQUESTS => Some(self.rate_limit_intervals.as_slice()),
            STATUS_BAD_REQUEST if message.contains(NOT_PROCESSED_MARKER) => {
                Some(self.upload_retry_intervals.as_slice())
            }
            _ => None,
        }
    }

    /// Runs `call`, retrying it according to this policy.
    ///
    /// Waiting is interrupted by `cancel`, in which case
    /// [`ApiError::Cancelled`] is returned without another attempt.
    pub async fn run<T, F, Fut>(&self, cancel: &CancellationToken, mut call: F) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let mut last = match call().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let Some(schedule) = self.intervals_for(&last) else {
            return Err(last);
        };

        for (attempt, delay) in schedule.iter().enumerate() {
            debug!(attempt = attempt + 1, delay = ?delay, error = %last, "Retrying platform call");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                _ = tokio::time::sleep(*delay) => {}
            }

            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if self.intervals_for(&err).is_none() => return Err(err),
                Err(err) => last = err,
            }
        }

        warn!(attempts = schedule.len() + 1, error = %last, "Retry schedule exhausted");
        Err(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn rate_limited() -> ApiError {
        ApiError::api(429, "too many requests")
    }

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[test]
    fn test_classification() {
        let policy = RetryPolicy::default();

        assert_eq!(
            policy.intervals_for(&rate_limited()),
            Some(&DEFAULT_RATE_LIMIT_INTERVALS[..])
        );
        assert_eq!(
            policy.intervals_for(&ApiError::api(400, "attachment.not.processed")),
            Some(&DEFAULT_UPLOAD_RETRY_INTERVALS[..])
        );
        assert_eq!(policy.intervals_for(&ApiError::api(400, "bad text")), None);
        assert_eq!(policy.intervals_for(&ApiError::api(500, "oops")), None);
        assert_eq!(policy.intervals_for(&ApiError::Timeout), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_second_attempt() {
        let policy = RetryPolicy::default()
            .with_rate_limit_intervals([Duration::from_secs(1), Duration::from_secs(2)]);
        let calls = counter();

        let result = policy
            .run(&CancellationToken::new(), || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { if n == 0 { Err(rate_limited()) } else { Ok(n) } }
            })
            .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_schedule_makes_n_plus_one_attempts() {
        let policy = RetryPolicy::default();
        let calls = counter();
        let start = tokio::time::Instant::now();

        let result: ApiResult<()> = policy
            .run(&CancellationToken::new(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(rate_limited()) }
            })
            .await;

        assert_eq!(result.unwrap_err().status(), Some(429));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(start.elapsed(), Duration::from_secs(18));
    }

    #[tokio::test]
    async fn test_non_retryable_error_makes_one_attempt() {
        let calls = counter();

        let result: ApiResult<()> = RetryPolicy::default()
            .run(&CancellationToken::new(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ApiError::api(403, "forbidden")) }
            })
            .await;

        assert_eq!(result.unwrap_err().status(), Some(403));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_error_becomes_non_retryable() {
        let calls = counter();

        let result: ApiResult<()> = RetryPolicy::default()
            .run(&CancellationToken::new(), || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(ApiError::api(400, "file.not.processed"))
                    } else {
                        Err(ApiError::network("connection reset"))
                    }
                }
            })
            .await;

        assert!(matches!(result, Err(ApiError::Network(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancellation_during_wait() {
        let cancel = CancellationToken::new();
        let calls = counter();

        let result: ApiResult<()> = RetryPolicy::default()
            .run(&cancel, || {
                calls.fetch_add(1, Ordering::SeqCst);
                cancel.cancel();
                async { Err(rate_limited()) }
            })
            .await;

        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_policy_returns_first_error() {
        let calls = counter();

        let result: ApiResult<()> = RetryPolicy::disabled()
            .run(&CancellationToken::new(), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(rate_limited()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
