//! Bounded retry over an async operation.
//!
//! Delay schedules come from `tokio-retry` strategies; the waiting itself goes
//! through a [`Sleeper`] so callers (and tests) decide how time passes.

use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_retry::strategy::{jitter, ExponentialBackoff, FixedInterval};

use crate::config::BackoffKind;

/// Waits between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Monotonic time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// How many times to retry and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: usize,
    pub delay: Duration,
    pub backoff: BackoffKind,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_millis(1000),
            backoff: BackoffKind::Fixed,
        }
    }
}

impl RetryPolicy {
    /// Total attempts including the first one.
    pub fn max_attempts(&self) -> usize {
        self.max_retries + 1
    }

    /// The delay before each retry, `max_retries` items long.
    pub fn strategy(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        let millis = self.delay.as_millis() as u64;
        match self.backoff {
            BackoffKind::Fixed => Box::new(FixedInterval::from_millis(millis).take(self.max_retries)),
            BackoffKind::Exponential => Box::new(
                ExponentialBackoff::from_millis(millis.max(2))
                    .max_delay(Duration::from_secs(10))
                    .map(jitter)
                    .take(self.max_retries),
            ),
        }
    }
}

/// The operation failed on every attempt.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: usize,
    pub last_error: E,
}

/// Run `operation` until it succeeds or the strategy runs out of delays.
///
/// `operation` receives the 1-based attempt number. Every failure is logged.
/// There is no wait after the final failure.
pub async fn retry_with_backoff<T, E, S, F, Fut>(
    strategy: S,
    sleeper: &dyn Sleeper,
    mut operation: F,
) -> Result<T, RetryExhausted<E>>
where
    S: IntoIterator<Item = Duration>,
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut delays = strategy.into_iter();
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::warn!(attempt = attempt, error = %e, "Generation attempt failed");
                match delays.next() {
                    Some(delay) => {
                        sleeper.sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        return Err(RetryExhausted {
                            attempts: attempt,
                            last_error: e,
                        })
                    }
                }
            }
        }
    }
}
