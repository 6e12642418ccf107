//! Fixed-schedule retry combinator.
//!
//! The combinator knows nothing about what it retries: the caller supplies
//! the operation and a predicate that says whether an outcome is worth
//! another attempt. Delays are non-blocking `tokio::time::sleep`s.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// How many times to try, and how long to wait between tries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
    schedule: Vec<Duration>,
}

impl RetryPolicy {
    /// Create a policy.
    ///
    /// The delay before retry *n* is `schedule[n - 1]`; when the schedule is
    /// shorter than `max_attempts - 1` its last entry repeats, and an empty
    /// schedule retries immediately. `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: usize, schedule: Vec<Duration>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            schedule,
        }
    }

    /// Role lookup policy: the first attempt plus three retries after 300,
    /// 600 and 900 ms.
    #[must_use]
    pub fn role_lookup() -> Self {
        Self::new(
            4,
            vec![
                Duration::from_millis(300),
                Duration::from_millis(600),
                Duration::from_millis(900),
            ],
        )
    }

    /// Maximum number of attempts, including the first.
    #[must_use]
    pub const fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Delay to wait after attempt `attempt` (1-based) fails.
    #[must_use]
    pub fn delay_after(&self, attempt: usize) -> Duration {
        let index = attempt.saturating_sub(1);
        self.schedule
            .get(index)
            .or_else(|| self.schedule.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Sum of every delay the policy can incur.
    #[must_use]
    pub fn total_delay(&self) -> Duration {
        (1..self.max_attempts).map(|a| self.delay_after(a)).sum()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::role_lookup()
    }
}

/// Final outcome of [`retry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T> {
    /// Outcome of the last attempt made.
    pub value: T,
    /// Number of attempts made, including the first.
    pub attempts: usize,
}

impl<T> Retried<T> {
    /// Whether retries ran out without an acceptable outcome.
    pub fn exhausted(&self, policy: &RetryPolicy, should_retry: impl Fn(&T) -> bool) -> bool {
        self.attempts >= policy.max_attempts && should_retry(&self.value)
    }
}

/// Run `operation` until `should_retry` rejects its outcome or the policy's
/// attempts run out.
///
/// No delay follows the final attempt.
pub async fn retry<T, F, Fut, P>(
    policy: &RetryPolicy,
    mut operation: F,
    should_retry: P,
) -> Retried<T>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = T>,
    P: Fn(&T) -> bool,
{
    let mut attempt = 1;
    loop {
        let value = operation(attempt).await;
        if attempt >= policy.max_attempts || !should_retry(&value) {
            return Retried {
                value,
                attempts: attempt,
            };
        }

        let delay = policy.delay_after(attempt);
        debug!(attempt, delay_ms = delay.as_millis(), "Retrying after delay");
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
