/// Resilience patterns for long-lived service connections
///
/// This library provides:
/// - **Reconnect backoff**: `2^attempt` time units between reconnects, with an
///   optional delay clamp and an optional attempt cap
/// - **Retry**: the same policy applied to a fallible async operation, gated by
///   a retryability predicate
/// - **Timeout**: bounded waits on a single async operation
///
/// # Example: retrying a rule sync on transient failures
///
/// ```rust,no_run
/// use resilience::{with_retry, BackoffConfig};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let config = BackoffConfig {
///         unit: Duration::from_millis(500),
///         max_attempts: Some(3),
///         ..Default::default()
///     };
///
///     let result = with_retry(&config, |_e: &String| true, || async {
///         // Your remote call here
///         Ok::<_, String>(())
///     })
///     .await;
/// }
/// ```

pub mod retry;
pub mod timeout;

pub use retry::{backoff_delay, with_retry, BackoffConfig, RetryError, RetryState};
pub use timeout::{with_timeout, TimeoutError};
