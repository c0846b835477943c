//! Bounded retry and deadline polling.
//!
//! Operations decide their own retriability by returning an [`Attempt`], so
//! neither helper ever inspects error identity. Both helpers sleep with
//! `tokio::time`, which lets tests drive them on paused virtual time, and
//! both stop early when the supplied [`CancellationToken`] fires.

use std::fmt::Display;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Failure reported by a single attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Attempt<E> {
    /// A transient failure; the operation may be retried.
    Retriable(E),
    /// A permanent failure; retrying cannot help.
    Fatal(E),
}

/// Outcome of an exhausted or interrupted [`RetryPolicy`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RetryError<E> {
    /// The last observed failure, either fatal or after the final attempt.
    Failed(E),
    /// The caller cancelled while waiting between attempts.
    Cancelled,
}

/// Outcome of an unsuccessful [`BoundedPoll`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PollError<E> {
    /// The deadline passed without a successful attempt.
    TimedOut {
        /// Failure reported by the final attempt.
        last: E,
    },
    /// The caller cancelled before the deadline.
    Cancelled,
}

/// Fixed-delay retry bounded by an attempt count.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy that runs at most `attempts` times (at least once),
    /// sleeping `delay` between attempts.
    #[must_use]
    pub const fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Maximum number of invocations.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay between invocations.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Invokes `operation` until it succeeds, fails fatally, or runs out of
    /// attempts.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError::Failed`] with the last failure, or
    /// [`RetryError::Cancelled`] when `cancel` fires before a retry.
    pub async fn run<T, E, F>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Result<T, Attempt<E>>,
        E: Display,
    {
        let mut remaining = self.attempts.max(1);
        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(Attempt::Fatal(err)) => return Err(RetryError::Failed(err)),
                Err(Attempt::Retriable(err)) => {
                    remaining = remaining.saturating_sub(1);
                    if remaining == 0 {
                        return Err(RetryError::Failed(err));
                    }
                    warn!(
                        error = %err,
                        remaining,
                        delay_ms = self.delay.as_millis(),
                        "attempt failed, retrying"
                    );
                }
            }

            tokio::select! {
                () = sleep(self.delay) => {}
                () = cancel.cancelled() => return Err(RetryError::Cancelled),
            }
        }
    }
}

/// Deadline-bounded polling at a fixed interval.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BoundedPoll {
    interval: Duration,
    timeout: Duration,
}

impl BoundedPoll {
    /// Creates a poll that retries every `interval` until `timeout` elapses.
    #[must_use]
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Delay between attempts.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Overall deadline measured from the first attempt.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Invokes `operation` until it succeeds or the deadline passes.
    ///
    /// Every failure is treated as retriable. Intermediate failures are only
    /// logged at debug level; the last one is returned with the timeout. No
    /// attempt starts after the deadline. A timeout too large to represent
    /// as an instant means the poll only ends on success or cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`PollError::TimedOut`] or [`PollError::Cancelled`].
    pub async fn run<T, E, F>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, PollError<E>>
    where
        F: FnMut() -> Result<T, E>,
        E: Display,
    {
        let deadline = Instant::now().checked_add(self.timeout);
        loop {
            if cancel.is_cancelled() {
                return Err(PollError::Cancelled);
            }

            let err = match operation() {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            debug!(error = %err, "poll attempt failed");

            if deadline.is_some_and(|limit| {
                Instant::now()
                    .checked_add(self.interval)
                    .is_none_or(|next| next > limit)
            }) {
                return Err(PollError::TimedOut { last: err });
            }

            tokio::select! {
                () = sleep(self.interval) => {}
                () = cancel.cancelled() => return Err(PollError::Cancelled),
            }
        }
    }
}
