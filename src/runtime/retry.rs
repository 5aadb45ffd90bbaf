// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry policies and backoff strategies for resilient dependency calls.
//!
//! A [`RetryPolicy`] looks at one classified attempt and decides whether the
//! client should try again and how long to wait first. Delays grow
//! exponentially and carry random jitter so that many callers backing off
//! from the same struggling dependency do not re-converge on it in lockstep.
//!
//! # Example
//!
//! ```
//! use keel_http_rs::runtime::{ExponentialBackoff, RetryPolicy};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = RetryPolicy::builder()
//!     .max_attempts(3)
//!     .backoff(ExponentialBackoff::new(Duration::from_millis(100)))
//!     .build()?;
//!
//! assert_eq!(policy.max_attempts, 3);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use crate::client::{AttemptOutcome, InvocationAttempt};
use crate::error::{KeelError, Result};

/// Defines a backoff strategy for retry delays.
pub trait BackoffStrategy: Clone + Send + Sync + 'static {
    /// Calculate the delay before the next attempt.
    ///
    /// # Arguments
    /// * `attempt_number` - The 1-based ordinal of the attempt that just failed
    fn delay(&self, attempt_number: u32) -> Duration;
}

// =============================================================================
// No Backoff
// =============================================================================

/// No delay between attempts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackoff;

impl NoBackoff {
    /// Create a new no-backoff strategy.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl BackoffStrategy for NoBackoff {
    fn delay(&self, _attempt_number: u32) -> Duration {
        Duration::ZERO
    }
}

// =============================================================================
// Fixed Backoff
// =============================================================================

/// Fixed delay between attempts.
#[derive(Debug, Clone, Copy)]
pub struct FixedBackoff {
    delay: Duration,
}

impl FixedBackoff {
    /// Create a new fixed backoff strategy.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Create a fixed backoff with delay in milliseconds.
    #[must_use]
    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    /// Create a fixed backoff with delay in seconds.
    #[must_use]
    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }
}

impl Default for FixedBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl BackoffStrategy for FixedBackoff {
    fn delay(&self, _attempt_number: u32) -> Duration {
        self.delay
    }
}

// =============================================================================
// Exponential Backoff
// =============================================================================

/// Exponential backoff with additive random jitter.
///
/// The delay after attempt `n` is `base * 2^(n-1)` plus a uniformly random
/// amount between zero and the jitter ceiling. With the defaults (100ms
/// base, 50ms ceiling) the first delay lands in 100-150ms and the second in
/// 200-250ms.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    base: Duration,
    jitter_ceiling: Duration,
    max_delay: Option<Duration>,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff strategy.
    #[must_use]
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            jitter_ceiling: Duration::from_millis(50),
            max_delay: None,
        }
    }

    /// Set the upper bound of the random jitter added to each delay.
    #[must_use]
    pub fn with_jitter_ceiling(mut self, jitter_ceiling: Duration) -> Self {
        self.jitter_ceiling = jitter_ceiling;
        self
    }

    /// Cap the grown delay (before jitter is added).
    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl BackoffStrategy for ExponentialBackoff {
    fn delay(&self, attempt_number: u32) -> Duration {
        let exponent = attempt_number.saturating_sub(1);
        let grown = self.base.saturating_mul(2u32.saturating_pow(exponent));
        let capped = match self.max_delay {
            Some(max) => grown.min(max),
            None => grown,
        };

        let ceiling_millis = self.jitter_ceiling.as_millis() as u64;
        if ceiling_millis == 0 {
            return capped;
        }
        let jitter = Duration::from_millis(rand::random::<u64>() % (ceiling_millis + 1));
        capped.saturating_add(jitter)
    }
}

// =============================================================================
// Retry Policy
// =============================================================================

/// The verdict for one classified attempt.
///
/// `delay` is only meaningful when `should_retry` is set; a stop decision
/// carries a zero delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    /// Whether the client should make another attempt.
    pub should_retry: bool,
    /// How long to wait before that attempt.
    pub delay: Duration,
}

/// Decides whether a failed or timed-out attempt is tried again.
///
/// Success and non-retryable failures always stop the loop. Retryable
/// failures and timeouts are retried until `max_attempts` have been made;
/// exhaustion is reported to the caller rather than swallowed.
#[derive(Debug, Clone)]
pub struct RetryPolicy<B: BackoffStrategy = ExponentialBackoff> {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Backoff strategy for computing inter-attempt delays.
    pub backoff: B,
    /// Optional wall-clock budget across all attempts of one call.
    pub overall_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: ExponentialBackoff::default(),
            overall_timeout: None,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a policy builder.
    #[must_use]
    pub fn builder() -> RetryPolicyBuilder<ExponentialBackoff> {
        RetryPolicyBuilder::new()
    }

    /// A policy that never retries.
    #[must_use]
    pub fn disabled() -> RetryPolicy<NoBackoff> {
        RetryPolicy {
            max_attempts: 1,
            backoff: NoBackoff,
            overall_timeout: None,
        }
    }
}

impl<B: BackoffStrategy> RetryPolicy<B> {
    /// Decide whether to retry after the given attempt.
    #[must_use]
    pub fn decide(&self, attempt: &InvocationAttempt) -> RetryDecision {
        match attempt.outcome {
            AttemptOutcome::Success | AttemptOutcome::NonRetryableFailure => RetryDecision {
                should_retry: false,
                delay: Duration::ZERO,
            },
            AttemptOutcome::RetryableFailure | AttemptOutcome::TimedOut => {
                if attempt.attempt_number >= self.max_attempts {
                    RetryDecision {
                        should_retry: false,
                        delay: Duration::ZERO,
                    }
                } else {
                    RetryDecision {
                        should_retry: true,
                        delay: self.backoff.delay(attempt.attempt_number),
                    }
                }
            }
        }
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder<B: BackoffStrategy> {
    max_attempts: u32,
    backoff: B,
    overall_timeout: Option<Duration>,
}

impl RetryPolicyBuilder<ExponentialBackoff> {
    /// Create a new builder with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_attempts: 3,
            backoff: ExponentialBackoff::default(),
            overall_timeout: None,
        }
    }
}

impl Default for RetryPolicyBuilder<ExponentialBackoff> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: BackoffStrategy> RetryPolicyBuilder<B> {
    /// Set the maximum number of attempts, including the first one.
    #[must_use]
    pub fn max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }

    /// Set the backoff strategy.
    #[must_use]
    pub fn backoff<B2: BackoffStrategy>(self, backoff: B2) -> RetryPolicyBuilder<B2> {
        RetryPolicyBuilder {
            max_attempts: self.max_attempts,
            backoff,
            overall_timeout: self.overall_timeout,
        }
    }

    /// Set the wall-clock budget across all attempts of one call.
    #[must_use]
    pub fn overall_timeout(mut self, timeout: Duration) -> Self {
        self.overall_timeout = Some(timeout);
        self
    }

    /// Build the policy.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `max_attempts` is zero; a call
    /// always makes at least one attempt.
    pub fn build(self) -> Result<RetryPolicy<B>> {
        if self.max_attempts == 0 {
            return Err(KeelError::Config(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: self.backoff,
            overall_timeout: self.overall_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn attempt(attempt_number: u32, outcome: AttemptOutcome) -> InvocationAttempt {
        InvocationAttempt {
            attempt_number,
            deadline: Instant::now(),
            outcome,
        }
    }

    #[test]
    fn test_no_backoff() {
        let backoff = NoBackoff::new();
        assert_eq!(backoff.delay(1), Duration::ZERO);
        assert_eq!(backoff.delay(5), Duration::ZERO);
        assert_eq!(backoff.delay(100), Duration::ZERO);
    }

    #[test]
    fn test_fixed_backoff() {
        let backoff = FixedBackoff::from_millis(100);
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(5), Duration::from_millis(100));
        assert_eq!(backoff.delay(100), Duration::from_millis(100));
    }

    #[test]
    fn test_exponential_backoff_without_jitter() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(100))
            .with_jitter_ceiling(Duration::ZERO);

        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(200));
        assert_eq!(backoff.delay(3), Duration::from_millis(400));
        assert_eq!(backoff.delay(4), Duration::from_millis(800));
    }

    #[test]
    fn test_exponential_backoff_jitter_stays_in_range() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(100))
            .with_jitter_ceiling(Duration::from_millis(50));

        for _ in 0..50 {
            let first = backoff.delay(1);
            assert!(first >= Duration::from_millis(100), "first={first:?}");
            assert!(first <= Duration::from_millis(150), "first={first:?}");

            let second = backoff.delay(2);
            assert!(second >= Duration::from_millis(200), "second={second:?}");
            assert!(second <= Duration::from_millis(250), "second={second:?}");
        }
    }

    #[test]
    fn test_exponential_backoff_cap() {
        let backoff = ExponentialBackoff::new(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(500))
            .with_jitter_ceiling(Duration::ZERO);

        assert_eq!(backoff.delay(10), Duration::from_millis(500));
    }

    #[test]
    fn test_exponential_backoff_saturates_on_large_attempts() {
        let backoff =
            ExponentialBackoff::new(Duration::from_secs(1)).with_jitter_ceiling(Duration::ZERO);

        // Doubling far past any practical attempt count must not wrap.
        assert!(backoff.delay(64) > backoff.delay(4));
    }

    #[test]
    fn test_decide_never_retries_success() {
        let policy = RetryPolicy::default();
        let decision = policy.decide(&attempt(1, AttemptOutcome::Success));
        assert!(!decision.should_retry);
        assert_eq!(decision.delay, Duration::ZERO);
    }

    #[test]
    fn test_decide_never_retries_non_retryable() {
        let policy = RetryPolicy::default();
        for n in 1..=3 {
            let decision = policy.decide(&attempt(n, AttemptOutcome::NonRetryableFailure));
            assert!(!decision.should_retry);
        }
    }

    #[test]
    fn test_decide_retries_retryable_below_max() {
        let policy = RetryPolicy::default();

        let decision = policy.decide(&attempt(1, AttemptOutcome::RetryableFailure));
        assert!(decision.should_retry);
        assert!(decision.delay >= Duration::from_millis(100));

        let decision = policy.decide(&attempt(2, AttemptOutcome::TimedOut));
        assert!(decision.should_retry);
        assert!(decision.delay >= Duration::from_millis(200));
    }

    #[test]
    fn test_decide_stops_at_max_attempts() {
        let policy = RetryPolicy::default();
        let decision = policy.decide(&attempt(3, AttemptOutcome::RetryableFailure));
        assert!(!decision.should_retry);

        let decision = policy.decide(&attempt(4, AttemptOutcome::TimedOut));
        assert!(!decision.should_retry);
    }

    #[test]
    fn test_single_attempt_policy_never_retries() {
        let policy = RetryPolicy::builder().max_attempts(1).build().unwrap();
        let decision = policy.decide(&attempt(1, AttemptOutcome::TimedOut));
        assert!(!decision.should_retry);
    }

    #[test]
    fn test_builder() {
        let policy = RetryPolicy::builder()
            .max_attempts(5)
            .backoff(FixedBackoff::from_millis(200))
            .overall_timeout(Duration::from_secs(60))
            .build()
            .unwrap();

        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.overall_timeout, Some(Duration::from_secs(60)));
        assert_eq!(policy.backoff.delay(3), Duration::from_millis(200));
    }

    #[test]
    fn test_builder_rejects_zero_attempts() {
        let result = RetryPolicy::builder().max_attempts(0).build();
        assert!(matches!(result, Err(KeelError::Config(_))));
    }

    #[test]
    fn test_disabled_policy() {
        let policy = RetryPolicy::disabled();
        assert_eq!(policy.max_attempts, 1);
        let decision = policy.decide(&attempt(1, AttemptOutcome::RetryableFailure));
        assert!(!decision.should_retry);
    }

    #[test]
    fn test_expected_delay_grows_strictly() {
        let backoff = ExponentialBackoff::default();

        // Each attempt's delay floor dominates the previous ceiling.
        let mut previous_ceiling = Duration::ZERO;
        for n in 1..=4 {
            let floor = Duration::from_millis(100) * 2u32.pow(n - 1);
            assert!(floor > previous_ceiling);
            let observed = backoff.delay(n);
            assert!(observed >= floor);
            previous_ceiling = floor + Duration::from_millis(50);
        }
    }
}
