//! Retry logic.
//!
//! # Responsibilities
//! - Run an upstream operation, classify each failure
//! - Retry transient failures with exponential backoff + jitter
//! - Stop on the first permanent failure
//! - Honor cancellation from the surrounding request pipeline
//!
//! # Design Decisions
//! - No shared state between invocations; the executor is `Clone` and cheap
//! - The caller's error type is returned as-is so callers can match on it
//! - Backoff is `tokio::time::sleep`, raced against cancellation

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::classify::{Classification, Classify};

/// Retry schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(2000),
            jitter: true,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: config.jitter,
        }
    }
}

impl RetryPolicy {
    /// Total attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before the attempt following `attempt`.
    ///
    /// An upstream hint can stretch the delay up to `max_delay`; the result is
    /// never shorter than `previous`.
    pub fn next_delay(&self, attempt: u32, hint: Option<Duration>, previous: Duration) -> Duration {
        let backoff = calculate_backoff(
            attempt,
            self.base_delay.as_millis() as u64,
            self.max_delay.as_millis() as u64,
            self.jitter,
        );
        let delay = match hint {
            Some(hint) => backoff.max(hint.min(self.max_delay)),
            None => backoff,
        };
        delay.max(previous)
    }
}

/// One observed failed attempt. Lives only for the duration of the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryAttempt {
    /// 1-based attempt index.
    pub attempt: u32,
    pub classification: Classification,
    /// Wait before the next attempt; `None` when no further attempt follows.
    pub delay: Option<Duration>,
}

/// Failure of a cancellable retry run.
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The pipeline cancelled the call; no further attempts were made.
    #[error("operation `{label}` cancelled after {attempts} attempt(s)")]
    Cancelled { label: String, attempts: u32 },

    /// The operation's own failure, unmodified.
    #[error(transparent)]
    Failed(E),
}

impl<E> RetryError<E> {
    /// The operation's failure, if the run was not cancelled.
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::Failed(e) => Some(e),
            RetryError::Cancelled { .. } => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }
}

/// Runs upstream operations with classification-driven retries.
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` until it succeeds, fails permanently, or the retry
    /// budget is spent. The last failure is returned unchanged.
    pub async fn execute_with_retry<T, E, F, Fut>(&self, operation: F, label: &str) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
    {
        match self
            .execute_with_retry_until(operation, label, std::future::pending::<()>())
            .await
        {
            Ok(value) => Ok(value),
            Err(RetryError::Failed(e)) => Err(e),
            Err(RetryError::Cancelled { .. }) => unreachable!("pending() never resolves"),
        }
    }

    /// Like [`execute_with_retry`](Self::execute_with_retry), but stops as
    /// soon as `cancelled` resolves, whether an attempt is in flight or the
    /// executor is backing off.
    pub async fn execute_with_retry_until<T, E, F, Fut, C>(
        &self,
        mut operation: F,
        label: &str,
        cancelled: C,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + fmt::Display,
        C: Future<Output = ()>,
    {
        tokio::pin!(cancelled);

        let max_attempts = self.policy.max_attempts();
        let mut previous_delay = Duration::ZERO;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            tracing::debug!(operation = label, attempt, "Starting upstream attempt");

            let result = tokio::select! {
                biased;
                _ = &mut cancelled => {
                    return Err(cancel(label, attempt));
                }
                result = operation() => result,
            };

            let error = match result {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(operation = label, attempt, "Upstream operation recovered after retry");
                    }
                    metrics::record_retry_attempt("success");
                    return Ok(value);
                }
                Err(error) => error,
            };

            let classification = error.classify();
            let delay = (classification.is_retryable() && attempt < max_attempts)
                .then(|| self.policy.next_delay(attempt, classification.delay_hint(), previous_delay));
            let record = RetryAttempt { attempt, classification, delay };

            let Some(delay) = record.delay else {
                let outcome = if record.classification.is_retryable() { "exhausted" } else { "permanent" };
                tracing::warn!(
                    operation = label,
                    attempt = record.attempt,
                    classification = %record.classification,
                    error = %error,
                    outcome,
                    "Upstream operation failed"
                );
                metrics::record_retry_attempt(outcome);
                return Err(RetryError::Failed(error));
            };

            tracing::info!(
                operation = label,
                attempt = record.attempt,
                classification = %record.classification,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Transient upstream failure, retrying"
            );
            metrics::record_retry_attempt("retry");
            previous_delay = delay;

            tokio::select! {
                biased;
                _ = &mut cancelled => {
                    return Err(cancel(label, attempt));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

fn cancel<E>(label: &str, attempts: u32) -> RetryError<E> {
    tracing::info!(operation = label, attempts, "Upstream operation cancelled, abandoning retries");
    metrics::record_retry_attempt("cancelled");
    RetryError::Cancelled {
        label: label.to_string(),
        attempts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum TestError {
        Status { status: u16, code: Option<&'static str>, seq: u32 },
        Timeout,
        Broken,
    }

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    impl Classify for TestError {
        fn classify(&self) -> Classification {
            match self {
                TestError::Status { status, code, .. } => {
                    crate::resilience::classify_status(*status, *code)
                }
                TestError::Timeout => Classification::retryable(),
                TestError::Broken => Classification::Permanent,
            }
        }
    }

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            jitter: false,
        }
    }

    fn status(status: u16, seq: u32) -> TestError {
        TestError::Status { status, code: None, seq }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_attempt() {
        let executor = RetryExecutor::new(quick_policy());
        let calls = Arc::new(AtomicU32::new(0));
        let cc = calls.clone();

        let result: Result<&str, TestError> = executor
            .execute_with_retry(
                move || {
                    let cc = cc.clone();
                    async move {
                        cc.fetch_add(1, Ordering::SeqCst);
                        Ok("done")
                    }
                },
                "list shares",
            )
            .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_transient_failure_takes_two_attempts() {
        let executor = RetryExecutor::new(quick_policy());
        let calls = Arc::new(AtomicU32::new(0));
        let cc = calls.clone();

        let result = executor
            .execute_with_retry(
                move || {
                    let cc = cc.clone();
                    async move {
                        let n = cc.fetch_add(1, Ordering::SeqCst) + 1;
                        if n == 1 { Err(TestError::Timeout) } else { Ok(n) }
                    }
                },
                "get share",
            )
            .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_503s_then_success() {
        let executor = RetryExecutor::new(quick_policy());
        let calls = Arc::new(AtomicU32::new(0));
        let cc = calls.clone();

        let result = executor
            .execute_with_retry(
                move || {
                    let cc = cc.clone();
                    async move {
                        let n = cc.fetch_add(1, Ordering::SeqCst) + 1;
                        if n < 3 { Err(status(503, n)) } else { Ok("shared") }
                    }
                },
                "create share",
            )
            .await;

        assert_eq!(result, Ok("shared"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_budget_surfaces_original_failure() {
        let executor = RetryExecutor::new(quick_policy());
        let calls = Arc::new(AtomicU32::new(0));
        let cc = calls.clone();

        let result: Result<(), TestError> = executor
            .execute_with_retry(
                move || {
                    let cc = cc.clone();
                    async move {
                        let n = cc.fetch_add(1, Ordering::SeqCst) + 1;
                        Err(TestError::Status { status: 401, code: Some("expired_token"), seq: n })
                    }
                },
                "refresh share",
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(
            result,
            Err(TestError::Status { status: 401, code: Some("expired_token"), seq: 4 })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_single_attempt() {
        let executor = RetryExecutor::new(quick_policy());
        let calls = Arc::new(AtomicU32::new(0));
        let cc = calls.clone();

        let result: Result<(), TestError> = executor
            .execute_with_retry(
                move || {
                    let cc = cc.clone();
                    async move {
                        let n = cc.fetch_add(1, Ordering::SeqCst) + 1;
                        Err(status(403, n))
                    }
                },
                "delete share",
            )
            .await;

        assert_eq!(result, Err(status(403, 1)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unclassified_failure_is_not_retried() {
        let executor = RetryExecutor::new(quick_policy());
        let calls = Arc::new(AtomicU32::new(0));
        let cc = calls.clone();

        let result: Result<(), TestError> = executor
            .execute_with_retry(
                move || {
                    let cc = cc.clone();
                    async move {
                        cc.fetch_add(1, Ordering::SeqCst);
                        Err(TestError::Broken)
                    }
                },
                "parse share",
            )
            .await;

        assert_eq!(result, Err(TestError::Broken));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_grows_between_attempts() {
        let executor = RetryExecutor::new(quick_policy());
        let stamps = Arc::new(Mutex::new(Vec::new()));
        let st = stamps.clone();

        let _: Result<(), TestError> = executor
            .execute_with_retry(
                move || {
                    let st = st.clone();
                    async move {
                        st.lock().unwrap().push(Instant::now());
                        Err(status(500, 0))
                    }
                },
                "list shares",
            )
            .await;

        let stamps = stamps.lock().unwrap();
        assert_eq!(stamps.len(), 4);
        let gaps: Vec<Duration> = stamps.windows(2).map(|w| w[1] - w[0]).collect();
        assert!(gaps[0] >= Duration::from_millis(100));
        assert!(gaps.windows(2).all(|g| g[1] >= g[0]), "gaps not monotone: {gaps:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_hint_stretches_backoff() {
        let executor = RetryExecutor::new(RetryPolicy {
            max_delay: Duration::from_secs(5),
            ..quick_policy()
        });

        let hint = Classification::Retryable { delay_hint: Some(Duration::from_millis(1500)) };
        assert_eq!(
            executor.policy().next_delay(1, hint.delay_hint(), Duration::ZERO),
            Duration::from_millis(1500)
        );
        // Hints are capped by max_delay.
        assert_eq!(
            executor.policy().next_delay(1, Some(Duration::from_secs(60)), Duration::ZERO),
            Duration::from_secs(5)
        );
        // And never shrink below the previous delay.
        assert_eq!(
            executor.policy().next_delay(2, None, Duration::from_millis(1500)),
            Duration::from_millis(1500)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_during_backoff() {
        let executor = RetryExecutor::new(quick_policy());
        let calls = Arc::new(AtomicU32::new(0));
        let cc = calls.clone();

        // Attempt 1 at t=0, attempt 2 at t=100ms, cancellation at t=150ms
        // lands inside the 200ms backoff.
        let result: Result<(), RetryError<TestError>> = executor
            .execute_with_retry_until(
                move || {
                    let cc = cc.clone();
                    async move {
                        let n = cc.fetch_add(1, Ordering::SeqCst) + 1;
                        Err(status(503, n))
                    }
                },
                "list shares",
                tokio::time::sleep(Duration::from_millis(150)),
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        match result {
            Err(RetryError::Cancelled { label, attempts }) => {
                assert_eq!(label, "list shares");
                assert_eq!(attempts, 2);
            }
            other => panic!("expected cancellation, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_during_attempt() {
        let executor = RetryExecutor::new(quick_policy());

        let result: Result<(), RetryError<TestError>> = executor
            .execute_with_retry_until(
                || async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(())
                },
                "slow call",
                tokio::time::sleep(Duration::from_secs(1)),
            )
            .await;

        let err = result.unwrap_err();
        assert!(err.is_cancelled());
        assert!(err.to_string().contains("slow call"));
        assert!(err.into_inner().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellable_run_passes_failure_through() {
        let executor = RetryExecutor::new(quick_policy());

        let result: Result<(), RetryError<TestError>> = executor
            .execute_with_retry_until(
                || async { Err(status(404, 1)) },
                "get share",
                std::future::pending::<()>(),
            )
            .await;

        assert_eq!(result.unwrap_err().into_inner(), Some(status(404, 1)));
    }

    #[test]
    fn test_policy_from_config() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay_ms: 50,
            max_delay_ms: 800,
            jitter: false,
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_attempts(), 6);
        assert_eq!(policy.base_delay, Duration::from_millis(50));
        assert_eq!(policy.max_delay, Duration::from_millis(800));
        assert!(!policy.jitter);
    }
}
