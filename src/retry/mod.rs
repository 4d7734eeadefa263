//! One retry policy for every network call.
//!
//! Delays grow linearly with the attempt number (`base + step * n`), are capped at
//! `max_delay_ms`, and may carry a small random jitter. Execution is delegated to
//! `tokio_retry::RetryIf`, which stops once the strategy iterator is exhausted.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio_retry::RetryIf;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub step_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::linear(3, 2_000, 1_000)
    }
}

impl RetryPolicy {
    pub fn linear(max_attempts: u32, base_delay_ms: u64, step_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            step_ms,
            max_delay_ms: u64::MAX,
            jitter_ms: 0,
        }
    }

    /// Run exactly once.
    pub fn none() -> Self {
        Self::linear(1, 0, 0)
    }

    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Delay to sleep after the `attempt`-th failure (1-based), before jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let ms = self
            .base_delay_ms
            .saturating_add(self.step_ms.saturating_mul(attempt as u64))
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }

    /// The sleep schedule between attempts; one entry fewer than `max_attempts`.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let policy = self.clone();
        (1..policy.max_attempts.max(1)).map(move |attempt| {
            let jitter = if policy.jitter_ms > 0 {
                rand::random_range(0..=policy.jitter_ms)
            } else {
                0
            };
            policy.delay_for(attempt) + Duration::from_millis(jitter)
        })
    }

    /// Retry `action` on every error until the attempt budget runs out.
    pub async fn run<T, E, F, Fut>(&self, label: &str, action: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.run_if(label, action, |_: &E| true).await
    }

    /// Retry `action` while `should_retry` accepts the error.
    pub async fn run_if<T, E, F, Fut, C>(
        &self,
        label: &str,
        action: F,
        mut should_retry: C,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        C: FnMut(&E) -> bool,
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 0u32;

        RetryIf::spawn(self.delays(), action, |e: &E| {
            attempt += 1;
            let retry = should_retry(e);
            if retry && attempt < max {
                warn!(
                    "{}: attempt {}/{} failed, retrying in ~{:?}: {}",
                    label,
                    attempt,
                    max,
                    self.delay_for(attempt),
                    e
                );
            }
            retry
        })
        .await
    }
}
