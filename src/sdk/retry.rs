//! Retry logic with exponential backoff.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::error::Error;

/// Parameters for exponential backoff.
#[derive(Debug, Clone)]
pub struct BackoffParams {
    /// Initial delay in milliseconds
    pub initial_ms: u64,
    /// Multiplier for each retry
    pub mult: f64,
    /// Maximum delay in milliseconds
    pub max_ms: u64,
    /// Maximum number of tries (None = unlimited)
    pub max_tries: Option<u32>,
    /// Maximum total time in milliseconds (None = unlimited)
    pub max_total_ms: Option<u64>,
}

impl Default for BackoffParams {
    fn default() -> Self {
        Self {
            initial_ms: 200,
            mult: 2.0,
            max_ms: 5_000,
            max_tries: Some(3),
            max_total_ms: Some(30_000),
        }
    }
}

/// Retry a function with exponential backoff.
///
/// # Arguments
///
/// * `f` - The async function to retry
/// * `can_retry` - Function to check if an error is retriable
/// * `params` - Backoff parameters
///
/// # Returns
///
/// The result of the function, or the last error if all retries failed.
pub async fn retry_with_backoff<F, Fut, T, E, R>(
    mut f: F,
    can_retry: R,
    params: &BackoffParams,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Debug,
{
    let start_time = std::time::Instant::now();
    let mut backoff_ms = 0u64;
    let mut tries = 0u32;

    loop {
        match f().await {
            Ok(result) => {
                if tries > 0 {
                    debug!("Operation succeeded after {} transient failures", tries);
                }
                return Ok(result);
            }
            Err(e) => {
                tries += 1;

                if let Some(max) = params.max_tries {
                    if tries >= max {
                        return Err(e);
                    }
                }

                if !can_retry(&e) {
                    return Err(e);
                }

                backoff_ms = if backoff_ms == 0 {
                    params.initial_ms
                } else {
                    ((backoff_ms as f64) * params.mult).min(params.max_ms as f64) as u64
                };

                if let Some(max_total) = params.max_total_ms {
                    let elapsed = start_time.elapsed().as_millis() as u64;
                    if elapsed + backoff_ms > max_total {
                        return Err(e);
                    }
                }

                debug!(
                    "Operation failed with error {:?}, retrying in {} ms; retries = {}",
                    e, backoff_ms, tries
                );

                sleep(Duration::from_millis(backoff_ms)).await;
            }
        }
    }
}

/// Retry with default retriable error check.
pub async fn retry_api<F, Fut, T>(f: F, params: &BackoffParams) -> crate::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = crate::Result<T>>,
{
    retry_with_backoff(f, |e: &Error| e.is_retriable(), params).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> BackoffParams {
        BackoffParams {
            initial_ms: 1,
            max_ms: 2,
            ..BackoffParams::default()
        }
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let calls = AtomicU32::new(0);
        let result = retry_api(
            || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(Error::api(503, "Service Unavailable", ""))
                } else {
                    Ok(42)
                }
            },
            &fast(),
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_does_not_retry_client_errors() {
        let calls = AtomicU32::new(0);
        let result: crate::Result<()> = retry_api(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::api(400, "Bad Request", "bad user_id"))
            },
            &fast(),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_tries() {
        let calls = AtomicU32::new(0);
        let result: crate::Result<()> = retry_api(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::api(500, "Internal Server Error", ""))
            },
            &fast(),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
