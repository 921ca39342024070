//! Retry helper for transient table failures.

use std::time::Duration;

use tracing::warn;

use crate::error::{Result, TableError};

/// Execute a table operation with exponential backoff retry.
///
/// Retries only transient errors ([`TableError::is_transient`]); everything
/// else is returned immediately.
pub async fn with_retry<F, Fut, T>(
    max_retries: u32,
    initial_backoff: Duration,
    op_name: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut backoff = initial_backoff;
    let mut last_error = None;

    for attempt in 0..=max_retries {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !e.is_transient() {
                    return Err(e);
                }

                last_error = Some(e);

                if attempt < max_retries {
                    warn!(
                        op = op_name,
                        attempt = attempt + 1,
                        max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        "Table operation failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| TableError::Unavailable(format!("{op_name} exhausted retries"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let attempts = AtomicU32::new(0);
        let result = with_retry(3, Duration::from_millis(1), "get", || async {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(TableError::Unavailable("flaky".to_string()))
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let attempts = AtomicU32::new(0);
        let result: Result<()> = with_retry(2, Duration::from_millis(1), "get", || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(TableError::Unavailable("down".to_string()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_transient_not_retried() {
        let attempts = AtomicU32::new(0);
        let result: Result<()> = with_retry(5, Duration::from_millis(1), "get", || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(TableError::MalformedItem("bad".to_string()))
        })
        .await;
        assert!(matches!(result, Err(TableError::MalformedItem(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
