//! Backoff policy and per-call retry bookkeeping.
//!
//! [`RetryPolicy`] holds the two pure decisions: how long to wait before an
//! attempt and whether a failure is worth another attempt at all.
//! [`RetryState`] applies them to one logical call; the async and blocking
//! clients drive the same state and differ only in how they sleep.

use crate::error::{Error, ErrorKind};
use crate::rate_limit::RateLimitConfig;
use rand::Rng;
use std::time::Duration;

/// Default number of attempts for one logical call.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default delay before the first retry.
pub const DEFAULT_BACKOFF_FACTOR: Duration = Duration::from_secs(1);
/// Default cap on any single backoff delay.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Defines when and how failed requests are retried.
///
/// `max_retries` bounds the total number of attempts of one logical call,
/// so the default of 3 means at most 3 requests hit the wire.
///
/// # Examples
///
/// ```
/// use jules_client::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// let delays: Vec<_> = (1..=6).map(|n| policy.delay_for_attempt(n).as_secs()).collect();
/// assert_eq!(delays, vec![1, 2, 4, 8, 10, 10]);
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Upper bound on attempts for one logical call.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each later one.
    pub backoff_factor: Duration,
    /// Cap on a single delay.
    pub max_backoff: Duration,
    /// Whether to scale delays randomly into 50%..100% of their value.
    pub jitter: bool,
    /// Handling of 429 responses.
    pub rate_limit: RateLimitConfig,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            max_backoff: DEFAULT_MAX_BACKOFF,
            jitter: false,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl RetryPolicy {
    /// Returns the backoff delay after the given attempt failed.
    ///
    /// `min(backoff_factor * 2^(attempt - 1), max_backoff)`, with `attempt` 1-indexed.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.max(1) - 1;
        let multiplier = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
        let delay = self
            .backoff_factor
            .saturating_mul(multiplier)
            .min(self.max_backoff);

        if self.jitter {
            let jitter_factor = rand::thread_rng().gen_range(0.5..=1.0);
            delay.mul_f64(jitter_factor)
        } else {
            delay
        }
    }

    /// Decides whether a failed attempt is retried.
    ///
    /// Never once `attempt >= max_retries`. Otherwise only network and server
    /// errors are retried; a rate-limit error is retried only when hints are
    /// honored and the response carried one.
    pub fn should_retry(&self, error: &Error, attempt: u32) -> bool {
        if attempt >= self.max_retries {
            return false;
        }

        match error.kind() {
            ErrorKind::Network | ErrorKind::Server => true,
            ErrorKind::RateLimit => self
                .rate_limit
                .delay_for_hint(error.retry_after_seconds())
                .is_some(),
            _ => false,
        }
    }

    /// Returns how long to wait after `error` ended `attempt`.
    pub fn retry_delay(&self, error: &Error, attempt: u32) -> Duration {
        self.rate_limit
            .delay_for_hint(error.retry_after_seconds())
            .unwrap_or_else(|| self.delay_for_attempt(attempt))
    }
}

/// Retry bookkeeping for one logical call.
///
/// Created at attempt 1 and discarded once the call resolves.
#[derive(Debug)]
pub struct RetryState<'a> {
    policy: &'a RetryPolicy,
    attempt: u32,
    last_error: Option<Error>,
}

impl<'a> RetryState<'a> {
    /// Starts a call at attempt 1.
    pub fn new(policy: &'a RetryPolicy) -> Self {
        Self {
            policy,
            attempt: 1,
            last_error: None,
        }
    }

    /// The attempt currently in flight (1-indexed).
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// The error that ended the previous attempt, if any.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Records a failed attempt.
    ///
    /// Returns the delay to wait before the next attempt, or gives the error
    /// back when the call must fail.
    pub fn next_delay(&mut self, error: Error) -> Result<Duration, Error> {
        if !self.policy.should_retry(&error, self.attempt) {
            return Err(error);
        }

        let delay = self.policy.retry_delay(&error, self.attempt);
        tracing::info!(
            delay_ms = delay.as_millis() as u64,
            attempt = self.attempt,
            max_retries = self.policy.max_retries,
            kind = ?error.kind(),
            "Retrying request after delay"
        );

        self.last_error = Some(error);
        self.attempt += 1;
        Ok(delay)
    }
}
