//! Retry with backoff for flaky fetches.
//!
//! `RetryOn` wraps a fallible operation. Errors selected by `matches` are
//! retried after `delay(i)` (where `i` is the 0-based failure index) until
//! `attempts` invocations have been made; anything else propagates at once.

use std::fmt::Display;
use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::error::SourceError;

pub struct RetryOn<P, D> {
    matches: P,
    attempts: usize,
    delay: D,
}

impl<P, D> RetryOn<P, D>
where
    D: Fn(u32) -> Duration,
{
    /// `attempts` is the total number of invocations, so it must be at least 1.
    pub fn new(matches: P, attempts: usize, delay: D) -> Result<Self, SourceError> {
        if attempts == 0 {
            return Err(SourceError::Validation(
                "retry attempts must be >= 1".to_string(),
            ));
        }
        Ok(Self {
            matches,
            attempts,
            delay,
        })
    }

    /// Run `op`, sleeping on the calling thread between attempts.
    pub fn run<T, E, F>(&self, op: F) -> Result<T, E>
    where
        P: Fn(&E) -> bool,
        E: Display,
        F: FnMut() -> Result<T, E>,
    {
        self.run_with_sleep(op, thread::sleep)
    }

    fn run_with_sleep<T, E, F, S>(&self, mut op: F, mut sleep: S) -> Result<T, E>
    where
        P: Fn(&E) -> bool,
        E: Display,
        F: FnMut() -> Result<T, E>,
        S: FnMut(Duration),
    {
        let mut failures: u32 = 0;

        loop {
            let err = match op() {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !(self.matches)(&err) {
                return Err(err);
            }

            failures += 1;
            if failures as usize >= self.attempts {
                warn!(attempts = self.attempts, error = %err, "Giving up after retries");
                return Err(err);
            }

            let wait = (self.delay)(failures - 1);
            warn!(
                attempt = failures,
                max_attempts = self.attempts,
                delay_ms = wait.as_millis() as u64,
                error = %err,
                "Retrying after error"
            );
            sleep(wait);
        }
    }
}

/// `base * 2^i`, saturating.
pub fn exponential(base: Duration) -> impl Fn(u32) -> Duration {
    move |i| base.saturating_mul(2u32.saturating_pow(i))
}
