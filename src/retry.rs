// ABOUTME: Bounded retry with linear backoff for flaky remote calls.
// ABOUTME: Wraps artifact store operations that are known to fail transiently.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Error returned once every attempt has been exhausted.
#[derive(Debug, Error)]
#[error("{operation} failed after {attempts} attempts: {source}")]
pub struct RetryError<E: std::error::Error> {
    pub operation: String,
    pub attempts: u32,
    #[source]
    pub source: E,
}

/// Retry policy: number of attempts and the backoff unit.
///
/// After attempt `n` fails (with attempts remaining), the wrapper sleeps
/// `n * base_delay` before retrying; with the defaults that is 2s then 4s.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

/// Run `f` until it succeeds or the policy is exhausted.
///
/// The inter-attempt sleep does not observe external cancellation: once an
/// attempt has failed, the next one runs unless the whole future is dropped.
pub async fn with_retry<T, E, F, Fut>(
    policy: RetryPolicy,
    operation: &str,
    mut f: F,
) -> Result<T, RetryError<E>>
where
    E: std::error::Error + Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.attempts => {
                let delay = policy.base_delay * attempt;
                tracing::warn!(
                    operation,
                    attempt,
                    "operation failed, retrying in {:?}: {}",
                    delay,
                    err
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                return Err(RetryError {
                    operation: operation.to_string(),
                    attempts: policy.attempts,
                    source: err,
                });
            }
        }
    }
}
