use std::fmt::Display;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

/// Errors that know whether repeating the failed call may succeed.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Delay between two attempts of a retried operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Sleep the same duration after every failed attempt.
    Fixed(Duration),
    /// Double the delay after every failed attempt, starting at `base`, never exceeding `max`.
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    /// Delay to sleep after the given (1-based) failed attempt.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Exponential { base, max } => {
                let exponent = attempt.saturating_sub(1).min(31);
                base.saturating_mul(1_u32 << exponent).min(max)
            }
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Fixed(Duration::from_secs(2))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
    time_budget: Option<Duration>,
}

impl RetryPolicy {
    /// A policy running at most `max_attempts` attempts. Zero is treated as one.
    #[must_use]
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            time_budget: None,
        }
    }

    /// A policy that runs the operation exactly once.
    #[must_use]
    pub fn once() -> Self {
        Self::new(1, Backoff::Fixed(Duration::ZERO))
    }

    /// Stop retrying once `budget` has elapsed since the first attempt started.
    #[must_use]
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    #[must_use]
    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget
    }
}

/// Run `op` until it succeeds, fails with a non-transient error, or the policy is exhausted.
///
/// The closure receives the 1-based attempt number. The error returned is the
/// one from the last attempt, unchanged.
///
/// # Errors
///
/// Returns the first non-transient error, or the last transient error once
/// all attempts (or the time budget) are used up.
pub fn retry_operation<T, E, F>(name: &str, policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    E: Transient + Display,
    F: FnMut(u32) -> Result<T, E>,
{
    let started = Instant::now();
    let mut attempt = 1;

    loop {
        match op(attempt) {
            Ok(value) => {
                if attempt > 1 {
                    info!(operation = name, attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) => {
                if attempt >= policy.max_attempts {
                    error!(
                        operation = name,
                        attempts = attempt,
                        error = %err,
                        "operation failed, giving up"
                    );
                    return Err(err);
                }

                let delay = policy.backoff.delay(attempt);
                if let Some(budget) = policy.time_budget {
                    if started.elapsed() + delay > budget {
                        error!(
                            operation = name,
                            attempts = attempt,
                            budget_secs = budget.as_secs(),
                            error = %err,
                            "operation failed, time budget exhausted"
                        );
                        return Err(err);
                    }
                }

                warn!(
                    operation = name,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "operation failed, retrying"
                );
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
                attempt += 1;
            }
        }
    }
}
