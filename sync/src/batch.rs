//! Bounded-concurrency batch execution with uniform retry.
//!
//! Every fan-out against the upstream gateway goes through
//! [`BatchExecutor`]: items are processed in sequential waves of at most
//! `batch_size` concurrent operations, each item independently retried
//! per the [`RetryPolicy`]. One item failing never aborts the others;
//! after all waves complete every failure is reported and the caller
//! receives the successes alongside the failures.

use futures_util::future::join_all;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Typed retry policy: attempt count plus an exponential backoff curve.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Total attempts per item, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// One attempt, no backoff.
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Backoff before attempt number `attempt` (0-based: the delay after
    /// the first failure is `delay_for(0)`).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

/// One item that ultimately failed, with the last error it produced.
#[derive(Debug)]
pub struct BatchFailure {
    pub item: String,
    pub reason: String,
}

/// Result of a batched run: the successes, and the items that failed
/// after exhausting their retries.
#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub succeeded: Vec<T>,
    pub failures: Vec<BatchFailure>,
}

impl<T> BatchOutcome<T> {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs a homogeneous unit of work over a list of items in fixed-size
/// concurrent waves.
#[derive(Clone, Copy, Debug)]
pub struct BatchExecutor {
    batch_size: usize,
    retry: RetryPolicy,
}

impl BatchExecutor {
    pub fn new(batch_size: usize, retry: RetryPolicy) -> Self {
        Self {
            batch_size: batch_size.max(1),
            retry,
        }
    }

    /// Process `items` in `ceil(N / batch_size)` sequential waves of up
    /// to `batch_size` concurrent `op` invocations. Partial failure is
    /// not escalated: failures are logged and returned, successes are
    /// kept.
    pub async fn run<I, T, E, F, Fut>(&self, items: Vec<I>, op: F) -> BatchOutcome<T>
    where
        I: Clone + Display,
        E: Display,
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut outcome = BatchOutcome {
            succeeded: Vec::with_capacity(items.len()),
            failures: Vec::new(),
        };

        for wave in items.chunks(self.batch_size) {
            let results = join_all(wave.iter().map(|item| self.attempt(item.clone(), &op))).await;
            for (item, result) in wave.iter().zip(results) {
                match result {
                    Ok(value) => outcome.succeeded.push(value),
                    Err(reason) => outcome.failures.push(BatchFailure {
                        item: item.to_string(),
                        reason,
                    }),
                }
            }
        }

        for failure in &outcome.failures {
            tracing::error!(item = %failure.item, reason = %failure.reason, "batch item failed");
        }
        outcome
    }

    /// Run `op` on one item with backoff until it succeeds or the policy
    /// is exhausted.
    async fn attempt<I, T, E, F, Fut>(&self, item: I, op: &F) -> Result<T, String>
    where
        I: Clone + Display,
        E: Display,
        F: Fn(I) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut last_error = String::new();
        for attempt in 0..self.retry.max_attempts.max(1) {
            if attempt > 0 {
                tokio::time::sleep(self.retry.delay_for(attempt - 1)).await;
            }
            match op(item.clone()).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    last_error = e.to_string();
                    tracing::debug!(item = %item, attempt, error = %last_error, "batch attempt failed");
                }
            }
        }
        Err(last_error)
    }
}
