// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Bounded retry execution for transport-level failures.
//!
//! The manager drives one logical operation through a bounded attempt loop
//! with exponential backoff and jitter. Retry state lives on the loop's
//! stack, scoped to a single logical request, and is discarded after success
//! or terminal failure. Callers decide which errors are retryable via a
//! predicate so semantic rejections are never retried here.

use std::{
    fmt::Debug,
    marker::PhantomData,
    time::{Duration, Instant},
};

use rand::Rng;
use tokio_util::sync::CancellationToken;

/// Configuration for retry behavior.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Initial delay (milliseconds) before the first retry.
    pub initial_delay_ms: u64,
    /// Maximum delay (milliseconds) between retries.
    pub max_delay_ms: u64,
    /// Exponential growth factor applied per retry.
    pub backoff_factor: f64,
    /// Maximum random jitter (milliseconds) added to each delay.
    pub jitter_ms: u64,
    /// Optional timeout (milliseconds) applied to each individual attempt.
    pub operation_timeout_ms: Option<u64>,
    /// Perform the first retry immediately, without delay.
    pub immediate_first: bool,
    /// Optional overall budget (milliseconds) across all attempts.
    pub max_elapsed_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 10_000,
            backoff_factor: 2.0,
            jitter_ms: 1_000,
            operation_timeout_ms: Some(60_000),
            immediate_first: false,
            max_elapsed_ms: Some(180_000),
        }
    }
}

/// Executes operations under a bounded retry policy.
pub struct RetryManager<E> {
    config: RetryConfig,
    _phantom: PhantomData<fn() -> E>,
}

impl<E> Debug for RetryManager<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(stringify!(RetryManager))
            .field("config", &self.config)
            .finish()
    }
}

impl<E: std::error::Error> RetryManager<E> {
    /// Creates a new [`RetryManager`] with the given configuration.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            _phantom: PhantomData,
        }
    }

    /// Executes `operation` until it succeeds, a non-retryable error occurs,
    /// or the retry budget is exhausted.
    ///
    /// `should_retry` decides retry eligibility per error; `create_error`
    /// converts internal conditions (attempt timeout, cancellation) into the
    /// caller's error type, receiving the literal message `"canceled"` on
    /// cancellation.
    ///
    /// # Errors
    ///
    /// Returns the last operation error once retries are exhausted or the
    /// error is not retryable, or a `create_error` value on timeout or
    /// cancellation.
    pub async fn execute_with_retry_with_cancel<T, F, Fut>(
        &self,
        operation_name: &str,
        mut operation: F,
        should_retry: impl Fn(&E) -> bool,
        create_error: impl Fn(String) -> E,
        cancellation_token: &CancellationToken,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            if cancellation_token.is_cancelled() {
                return Err(create_error("canceled".to_string()));
            }

            let result = match self.config.operation_timeout_ms {
                Some(timeout_ms) => {
                    match tokio::time::timeout(Duration::from_millis(timeout_ms), operation()).await
                    {
                        Ok(result) => result,
                        Err(_) => Err(create_error(format!(
                            "Operation `{operation_name}` timed out after {timeout_ms}ms"
                        ))),
                    }
                }
                None => operation().await,
            };

            match result {
                Ok(value) => return Ok(value),
                Err(error) => {
                    attempt += 1;

                    if !should_retry(&error) || attempt > self.config.max_retries {
                        return Err(error);
                    }

                    if let Some(max_elapsed_ms) = self.config.max_elapsed_ms {
                        if started.elapsed() >= Duration::from_millis(max_elapsed_ms) {
                            return Err(error);
                        }
                    }

                    let delay = self.delay_for(attempt);
                    tracing::debug!(
                        "Retrying `{operation_name}` (attempt {attempt}/{}) after {delay:?}: {error}",
                        self.config.max_retries,
                    );

                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = cancellation_token.cancelled() => {
                            return Err(create_error("canceled".to_string()));
                        }
                    }
                }
            }
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 1 && self.config.immediate_first {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt.saturating_sub(1).min(31)).unwrap_or(31);
        let base = (self.config.initial_delay_ms as f64) * self.config.backoff_factor.powi(exponent);
        let capped = base.min(self.config.max_delay_ms as f64) as u64;
        let jitter = if self.config.jitter_ms > 0 {
            rand::rng().random_range(0..=self.config.jitter_ms)
        } else {
            0
        };

        Duration::from_millis(capped.saturating_add(jitter))
    }
}
