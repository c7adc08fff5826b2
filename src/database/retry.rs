use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Run `op`, retrying it once after `backoff` when it fails with a transient
/// datastore error. Any second failure is returned to the caller.
pub async fn with_transient_retry<T, F, Fut>(
    operation: &str,
    backoff: Duration,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match op().await {
        Err(err) if err.is_transient() => {
            warn!(
                operation = %operation,
                error = %err,
                backoff_ms = backoff.as_millis() as u64,
                "Transient datastore failure, retrying once"
            );
            tokio::time::sleep(backoff).await;
            op().await
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FleetError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_transient_failure_is_retried_once() {
        let attempts = AtomicUsize::new(0);
        let result: Result<u32> = with_transient_retry("test", Duration::from_millis(1), || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(FleetError::from(sqlx::Error::PoolTimedOut))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_transient_failure_surfaces() {
        let attempts = AtomicUsize::new(0);
        let result: Result<u32> = with_transient_retry("test", Duration::from_millis(1), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(FleetError::from(sqlx::Error::PoolTimedOut)) }
        })
        .await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let attempts = AtomicUsize::new(0);
        let result: Result<u32> = with_transient_retry("test", Duration::from_millis(1), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(FleetError::validation("bad input")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
