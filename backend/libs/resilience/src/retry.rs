/// Exponential reconnect backoff: attempt `n` waits `2^n` time units
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Length of one backoff time unit
    pub unit: Duration,
    /// Upper bound applied to every computed delay
    pub max_delay: Option<Duration>,
    /// Give up after this many retries (`None` retries forever)
    pub max_attempts: Option<u32>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            unit: Duration::from_secs(1),
            max_delay: None,
            max_attempts: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("Max retries ({attempts}) exceeded, last error: {last}")]
    MaxRetriesExceeded { attempts: u32, last: E },
    #[error("Operation failed: {0}")]
    OperationFailed(E),
}

/// Delay before reconnect number `attempt` (zero-based).
///
/// Saturates instead of overflowing for very large attempt counts.
pub fn backoff_delay(config: &BackoffConfig, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    let delay = config.unit.checked_mul(factor).unwrap_or(Duration::MAX);

    match config.max_delay {
        Some(max) => delay.min(max),
        None => delay,
    }
}

/// Reconnect counter owned by exactly one connection loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    attempt: u32,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Delay for the pending retry, advancing the counter.
    ///
    /// Returns `None` once `max_attempts` retries have been handed out.
    pub fn next_delay(&mut self, config: &BackoffConfig) -> Option<Duration> {
        if let Some(max) = config.max_attempts {
            if self.attempt >= max {
                return None;
            }
        }

        let delay = backoff_delay(config, self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        Some(delay)
    }
}

/// Execute a future, retrying failures the predicate accepts.
///
/// Non-retryable errors are returned immediately as `OperationFailed`.
pub async fn with_retry<F, Fut, T, E, P>(
    config: &BackoffConfig,
    is_retryable: P,
    mut f: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut state = RetryState::new();

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !is_retryable(&e) {
                    return Err(RetryError::OperationFailed(e));
                }

                let attempt = state.attempt();
                let Some(delay) = state.next_delay(config) else {
                    warn!(attempts = attempt, "Max retries reached");
                    return Err(RetryError::MaxRetriesExceeded {
                        attempts: attempt,
                        last: e,
                    });
                };

                warn!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying after failure"
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}
