use crate::policy::StreamConfig;
use crate::{Provisioner, ProvisionerError};

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, instrument, warn};

/// Retry settings for `RetryingProvisioner`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RetryConfig {
    /// Maximum number of attempts per call, counting the first one. Defaults to 3 if not set.
    ///
    /// A value of 0 is treated as 1, so the operation always runs at least once.
    pub max_retries: Option<usize>,

    /// Base delay for exponential backoff between retries. Defaults to 100ms if not set.
    pub retry_base_delay: Option<Duration>,

    /// Maximum delay for exponential backoff. Defaults to 5 seconds if not set.
    pub retry_max_delay: Option<Duration>,
}

/// Wraps a provisioner and retries calls that fail with a retriable error.
///
/// Permanent failures (conflicts, rejections, drift) are returned on the first attempt.
#[derive(Clone, Debug)]
pub struct RetryingProvisioner<P> {
    inner: P,
    max_retries: usize,
    retry_base_delay: Duration,
    retry_max_delay: Duration,
}

impl<P> RetryingProvisioner<P>
where
    P: Provisioner,
{
    /// Creates a new instance of `RetryingProvisioner`.
    #[must_use]
    pub fn new(
        inner: P,
        RetryConfig {
            max_retries,
            retry_base_delay,
            retry_max_delay,
        }: RetryConfig,
    ) -> Self {
        Self {
            inner,
            max_retries: max_retries.unwrap_or(3).max(1),
            retry_base_delay: retry_base_delay.unwrap_or(Duration::from_millis(100)),
            retry_max_delay: retry_max_delay.unwrap_or(Duration::from_secs(5)),
        }
    }

    /// The wrapped provisioner.
    #[must_use]
    pub const fn inner(&self) -> &P {
        &self.inner
    }

    /// Executes an operation with retry logic and exponential backoff.
    async fn with_retry<F, Fut, R>(&self, operation_name: &str, operation: F) -> Result<R, P::Error>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<R, P::Error>> + Send,
        R: Send,
    {
        let mut attempts = 0;
        let mut delay = self.retry_base_delay;

        loop {
            attempts += 1;

            match operation().await {
                Ok(result) => {
                    if attempts > 1 {
                        debug!(
                            operation = operation_name,
                            attempts = attempts,
                            "Operation succeeded after retry"
                        );
                    }
                    return Ok(result);
                }
                Err(e) if !e.is_retriable() => {
                    debug!(
                        operation = operation_name,
                        error = %e,
                        "Operation failed with non-retriable error"
                    );
                    return Err(e);
                }
                Err(e) if attempts >= self.max_retries => {
                    error!(
                        operation = operation_name,
                        attempts = attempts,
                        error = %e,
                        "Operation failed after maximum retries"
                    );
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        operation = operation_name,
                        attempt = attempts,
                        max_attempts = self.max_retries,
                        delay = ?delay,
                        error = %e,
                        "Operation failed, retrying"
                    );
                }
            }

            tokio::time::sleep(delay).await;

            // Exponential backoff with 0-10% jitter
            delay = std::cmp::min(
                delay.mul_f64(fastrand::f64().mul_add(0.1, 2.0)),
                self.retry_max_delay,
            );
        }
    }
}

#[async_trait]
impl<P> Provisioner for RetryingProvisioner<P>
where
    P: Provisioner,
{
    type Error = P::Error;

    fn stream_name(&self) -> &str {
        self.inner.stream_name()
    }

    #[instrument(skip(self), fields(stream = %self.inner.stream_name()))]
    async fn ensure_stream(&self) -> Result<StreamConfig, Self::Error> {
        self.with_retry("ensure_stream", || self.inner.ensure_stream())
            .await
    }

    #[instrument(skip(self), fields(stream = %self.inner.stream_name()))]
    async fn delete_stream(&self) -> Result<(), Self::Error> {
        self.with_retry("delete_stream", || self.inner.delete_stream())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;
    use thiserror::Error;
    use tracing_test::traced_test;

    #[derive(Debug, Error, PartialEq, Eq)]
    enum FlakyError {
        #[error("connection refused")]
        Transient,
        #[error("subjects overlap")]
        Permanent,
    }

    impl ProvisionerError for FlakyError {
        fn is_retriable(&self) -> bool {
            *self == Self::Transient
        }
    }

    /// Fails the first `failures` calls with `error`, then succeeds.
    struct FlakyProvisioner {
        calls: AtomicUsize,
        failures: usize,
        error: fn() -> FlakyError,
    }

    impl FlakyProvisioner {
        fn new(failures: usize, error: fn() -> FlakyError) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures,
                error,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn attempt(&self) -> Result<(), FlakyError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                Err((self.error)())
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl Provisioner for FlakyProvisioner {
        type Error = FlakyError;

        fn stream_name(&self) -> &str {
            "flaky"
        }

        async fn ensure_stream(&self) -> Result<StreamConfig, Self::Error> {
            self.attempt().map(|()| StreamConfig::new("flaky"))
        }

        async fn delete_stream(&self) -> Result<(), Self::Error> {
            self.attempt()
        }
    }

    fn fast_retries(max_retries: usize) -> RetryConfig {
        RetryConfig {
            max_retries: Some(max_retries),
            retry_base_delay: Some(Duration::from_millis(1)),
            retry_max_delay: Some(Duration::from_millis(5)),
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn test_retries_transient_errors() {
        let provisioner = RetryingProvisioner::new(
            FlakyProvisioner::new(2, || FlakyError::Transient),
            fast_retries(3),
        );

        let config = provisioner
            .ensure_stream()
            .await
            .expect("should succeed on third attempt");

        assert_eq!(config.name, "flaky");
        assert_eq!(provisioner.inner().calls(), 3);
        assert!(logs_contain("Operation succeeded after retry"));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let provisioner = RetryingProvisioner::new(
            FlakyProvisioner::new(10, || FlakyError::Transient),
            fast_retries(3),
        );

        let result = provisioner.delete_stream().await;

        assert_matches!(result, Err(FlakyError::Transient));
        assert_eq!(provisioner.inner().calls(), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let provisioner = RetryingProvisioner::new(
            FlakyProvisioner::new(10, || FlakyError::Permanent),
            fast_retries(5),
        );

        let result = provisioner.ensure_stream().await;

        assert_matches!(result, Err(FlakyError::Permanent));
        assert_eq!(provisioner.inner().calls(), 1);
    }

    #[tokio::test]
    async fn test_zero_max_retries_still_attempts_once() {
        let provisioner = RetryingProvisioner::new(
            FlakyProvisioner::new(10, || FlakyError::Transient),
            fast_retries(0),
        );

        let result = provisioner.ensure_stream().await;

        assert_matches!(result, Err(FlakyError::Transient));
        assert_eq!(provisioner.inner().calls(), 1);
    }

    #[tokio::test]
    async fn test_defaults() {
        let provisioner = RetryingProvisioner::new(
            FlakyProvisioner::new(0, || FlakyError::Transient),
            RetryConfig::default(),
        );

        assert_eq!(provisioner.max_retries, 3);
        assert_eq!(provisioner.retry_base_delay, Duration::from_millis(100));
        assert_eq!(provisioner.retry_max_delay, Duration::from_secs(5));
        assert_eq!(provisioner.stream_name(), "flaky");
    }
}
