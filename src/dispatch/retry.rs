//! Retry with exponential backoff for handler invocations

use std::future::Future;
use std::time::Duration;

use super::DispatchError;
use super::handler::HandlerReply;

/// Retry policy for transient handler failures
///
/// Controls how many times a failed invocation is retried and how
/// long to wait between attempts using exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Base delay between retries (doubles each attempt)
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(2000),
        }
    }
}

/// Compute the delay before the retry that follows `attempt`.
///
/// `min(base_delay * 2^attempt, max_delay)`
#[must_use]
pub fn delay_for_attempt(policy: &RetryPolicy, attempt: u32) -> Duration {
    policy
        .base_delay
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(policy.max_delay)
}

/// Result of running an invocation through the retry loop
#[derive(Debug)]
pub struct RetryOutcome {
    pub result: Result<HandlerReply, DispatchError>,
    /// Invocations made, including the first
    pub attempts: u32,
    /// Backoff delays slept between invocations
    pub delays: Vec<Duration>,
}

/// Runs an invocation, retrying transient handler errors with backoff
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    #[must_use]
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Invoke `op` until it succeeds, fails permanently, or retries run out
    ///
    /// `first_attempt` is the retry counter to start from; `op` receives the
    /// current counter.
    pub async fn run<F, Fut>(&self, first_attempt: u32, mut op: F) -> RetryOutcome
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<HandlerReply, DispatchError>>,
    {
        let mut retry_attempt = first_attempt;
        let mut attempts = 0;
        let mut delays = Vec::new();

        loop {
            let result = op(retry_attempt).await;
            attempts += 1;

            match result {
                Err(DispatchError::Handler(e))
                    if e.is_transient() && retry_attempt < self.policy.max_retries =>
                {
                    let delay = delay_for_attempt(&self.policy, retry_attempt);
                    tracing::warn!(
                        error = %e,
                        retry_attempt = retry_attempt + 1,
                        max_retries = self.policy.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "transient handler error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delays.push(delay);
                    retry_attempt += 1;
                }
                result => {
                    return RetryOutcome {
                        result,
                        attempts,
                        delays,
                    };
                }
            }
        }
    }
}
