//! Retry with exponential backoff, expressed as an explicit state machine.

use std::future::Future;
use std::time::Duration;

use crate::provider::{ProviderError, ProviderErrorKind};

/// Backoff strategy for retrying failed provider calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Fixed delay between retries.
    Fixed { delay: Duration },
    /// Exponential delay: `base * (factor ^ attempt)`, capped at `max`,
    /// with optional +/- 50% jitter.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(200),
            factor: 2.0,
            max: Duration::from_secs(5),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Delay before the retry following `attempt` (0-based). A
    /// server-provided `Retry-After` hint raises the delay but never
    /// lowers it.
    pub fn delay_for(self, attempt: u32, hint: Option<Duration>) -> Duration {
        let computed = match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let scale = factor.powi(attempt as i32);
                let seconds = (base.as_secs_f64() * scale).min(max.as_secs_f64());
                let mut delay = Duration::from_secs_f64(seconds);

                if jitter {
                    let jitter_ms = (delay.as_millis() as f64 * 0.5) as u64;
                    let offset = fastrand::u64(0..=(jitter_ms * 2));
                    let total = delay.as_millis() as i64 + (offset as i64 - jitter_ms as i64);
                    delay = Duration::from_millis(total.max(0) as u64);
                }

                delay
            }
        };

        match hint {
            Some(hint) if hint > computed => hint,
            _ => computed,
        }
    }
}

/// How an error should be handled by the retry driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// The source has no answer; callers substitute an empty result.
    NotFound,
    /// Never retried (401, bad request, unsupported operation).
    Fatal,
    /// Retried with backoff (timeout, 5xx, 429, network).
    Retryable,
}

/// Classify a provider error into its retry disposition.
pub fn classify(error: &ProviderError) -> ErrorDisposition {
    match error.kind() {
        ProviderErrorKind::NotFound => ErrorDisposition::NotFound,
        _ if error.retryable() => ErrorDisposition::Retryable,
        _ => ErrorDisposition::Fatal,
    }
}

/// Retry driver state. `Waiting` carries the delay before the next
/// attempt; `Exhausted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Attempting { attempt: u32 },
    Waiting { attempt: u32, delay: Duration },
    Exhausted,
}

/// Bounded-retry policy wrapping provider operations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Maximum retries after the first attempt.
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Backoff::default(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Backoff) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// Pure transition after a retryable failure on `attempt` (0-based).
    pub fn next_state(&self, attempt: u32, hint: Option<Duration>) -> RetryState {
        if attempt >= self.max_retries {
            return RetryState::Exhausted;
        }
        RetryState::Waiting {
            attempt: attempt + 1,
            delay: self.backoff.delay_for(attempt, hint),
        }
    }

    /// Drive `call` until it succeeds, fails fatally, or exhausts retries.
    /// Exhaustion surfaces the last error annotated with `operation`.
    /// Not-found passes through unannotated so the caller can substitute
    /// an empty result.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 0u32;
        loop {
            let error = match call().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            match classify(&error) {
                ErrorDisposition::NotFound => return Err(error),
                ErrorDisposition::Fatal => return Err(error.for_operation(operation)),
                ErrorDisposition::Retryable => match self.next_state(attempt, error.retry_after()) {
                    RetryState::Waiting { attempt: next, delay } => {
                        tracing::debug!(
                            operation,
                            attempt = next,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "retrying provider call"
                        );
                        tokio::time::sleep(delay).await;
                        attempt = next;
                    }
                    _ => return Err(error.for_operation(operation)),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn exponential_backoff_doubles_until_cap() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_secs(1),
            jitter: false,
        };

        assert_eq!(backoff.delay_for(0, None), Duration::from_millis(100));
        assert_eq!(backoff.delay_for(1, None), Duration::from_millis(200));
        assert_eq!(backoff.delay_for(2, None), Duration::from_millis(400));
        assert_eq!(backoff.delay_for(4, None), Duration::from_secs(1));
    }

    #[test]
    fn retry_after_hint_raises_but_never_lowers_delay() {
        let backoff = Backoff::Fixed {
            delay: Duration::from_millis(100),
        };
        assert_eq!(
            backoff.delay_for(0, Some(Duration::from_secs(2))),
            Duration::from_secs(2)
        );
        assert_eq!(
            backoff.delay_for(0, Some(Duration::from_millis(10))),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn state_machine_exhausts_after_max_retries() {
        let policy = RetryPolicy::new(2, Backoff::Fixed {
            delay: Duration::from_millis(1),
        });

        assert!(matches!(
            policy.next_state(0, None),
            RetryState::Waiting { attempt: 1, .. }
        ));
        assert!(matches!(
            policy.next_state(1, None),
            RetryState::Waiting { attempt: 2, .. }
        ));
        assert_eq!(policy.next_state(2, None), RetryState::Exhausted);
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let policy = RetryPolicy::new(3, Backoff::Fixed {
            delay: Duration::from_millis(1),
        });
        let calls = AtomicU32::new(0);

        let result = policy
            .run("search_by_title", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ProviderError::upstream("boom"))
                    } else {
                        Ok(42u32)
                    }
                }
            })
            .await;

        assert_eq!(result.expect("should recover"), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);

        let result: Result<u32, _> = policy
            .run("search_by_isbn", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::unauthorized("bad key")) }
            })
            .await;

        let error = result.expect_err("must fail");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(error.operation(), Some("search_by_isbn"));
    }

    #[tokio::test]
    async fn not_found_passes_through_without_retry() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);

        let result: Result<u32, _> = policy
            .run("search_by_isbn", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::not_found("no such record")) }
            })
            .await;

        let error = result.expect_err("not found is surfaced to the caller");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(error.kind(), crate::provider::ProviderErrorKind::NotFound);
        assert_eq!(error.operation(), None);
    }

    #[tokio::test]
    async fn exhaustion_surfaces_last_error_with_operation() {
        let policy = RetryPolicy::new(1, Backoff::Fixed {
            delay: Duration::from_millis(1),
        });
        let calls = AtomicU32::new(0);

        let result: Result<u32, _> = policy
            .run("search", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::timeout("deadline exceeded")) }
            })
            .await;

        let error = result.expect_err("must exhaust");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(error.operation(), Some("search"));
    }
}
