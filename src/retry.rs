// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Lifecycle Polling with Backoff
 * Caller-side poll loop for idempotent cloud resource operations
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::errors::{ScanError, ScanResult};

/// Poll cadence configuration. Lifecycle operations are single
/// probe-or-begin-create steps; this loop supplies the cadence they
/// intentionally do not contain.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of poll attempts before giving up.
    pub max_attempts: u32,

    /// Backoff used when a retryable error carries no wait hint.
    pub initial_backoff: Duration,

    /// Ceiling for both hinted and computed waits.
    pub max_backoff: Duration,

    /// Backoff multiplier (typically 2.0 for exponential)
    pub backoff_multiplier: f64,

    /// Enable jitter to prevent thundering herd
    pub enable_jitter: bool,

    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            initial_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(300),
            backoff_multiplier: 2.0,
            enable_jitter: true,
            jitter_factor: 0.2,
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.enable_jitter = false;
        self
    }

    /// Calculate backoff duration for a given attempt
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_secs(0);
        }

        let base_backoff = self.initial_backoff.as_millis() as f64
            * self.backoff_multiplier.powi((attempt - 1) as i32);

        let capped_backoff = base_backoff.min(self.max_backoff.as_millis() as f64);

        let backoff_with_jitter = if self.enable_jitter {
            let mut rng = rand::rng();
            let jitter_range = capped_backoff * self.jitter_factor;
            let jitter = rng.random_range(-jitter_range..jitter_range);
            (capped_backoff + jitter).max(0.0)
        } else {
            capped_backoff
        };

        Duration::from_millis(backoff_with_jitter as u64)
    }

    /// Clamp a hinted wait into the configured ceiling.
    fn clamp(&self, hint: Duration) -> Duration {
        hint.min(self.max_backoff)
    }
}

/// Drive an idempotent lifecycle operation until it reaches terminal
/// success or fails fatally.
///
/// The operation is a single non-blocking probe-or-begin action. A
/// retryable error's estimated-wait hint sets the sleep before the next
/// poll; without a hint the exponential backoff applies. Fatal errors
/// propagate immediately.
pub async fn poll_until_ready<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> ScanResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ScanResult<T>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        debug!(
            attempt = attempt,
            max_attempts = config.max_attempts,
            operation = operation_name,
            "Polling operation"
        );

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        attempt = attempt,
                        operation = operation_name,
                        "Operation reached terminal state"
                    );
                }
                return Ok(result);
            }
            Err(err) if err.is_retryable() => {
                if attempt >= config.max_attempts {
                    warn!(
                        operation = operation_name,
                        attempts = attempt,
                        "Max poll attempts reached"
                    );
                    return Err(ScanError::fatal(format!(
                        "operation '{}' did not reach terminal state after {} attempts: {}",
                        operation_name, attempt, err
                    )));
                }

                let wait = match err.retry_delay() {
                    Some(hint) => config.clamp(hint),
                    None => config.calculate_backoff(attempt),
                };

                debug!(
                    attempt = attempt,
                    wait_ms = wait.as_millis(),
                    operation = operation_name,
                    reason = %err,
                    "Not ready yet, backing off"
                );

                tokio::time::sleep(wait).await;
            }
            Err(err) => {
                warn!(
                    operation = operation_name,
                    attempt = attempt,
                    error = %err,
                    "Operation failed with non-retryable error"
                );
                return Err(err);
            }
        }
    }
}
