//! Replays a whole unit of work after a retryable failure.
//!
//! Each attempt opens its own transaction, so a replay starts from committed
//! state: stale stock is re-read under the lock and a new order code is
//! drawn.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use tracing::warn;

use crate::config::RetrySettings;
use crate::error::OrderResult;

/// Runs `attempt` until it succeeds, fails permanently, or attempts run out.
///
/// The closure receives the 1-based attempt number.
pub(crate) async fn with_retry<T, F, Fut>(
    settings: &RetrySettings,
    operation: &'static str,
    mut attempt: F,
) -> OrderResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = OrderResult<T>>,
{
    let mut backoff = settings.create_backoff();
    let mut n = 1;

    loop {
        match attempt(n).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && n < settings.max_attempts => {
                let delay = backoff
                    .next_backoff()
                    .unwrap_or_else(|| Duration::from_millis(settings.max_backoff_ms));
                warn!(
                    operation,
                    attempt = n,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying unit of work"
                );
                tokio::time::sleep(delay).await;
                n += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrderError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tally_db::DbError;

    fn fast() -> RetrySettings {
        RetrySettings {
            max_attempts: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        }
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast(), "test", |n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 3 {
                    Err(OrderError::Database(DbError::Busy("database is locked".into())))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: OrderResult<()> = with_retry(&fast(), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(OrderError::Database(DbError::PoolExhausted)) }
        })
        .await;

        assert!(result.unwrap_err().is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: OrderResult<()> = with_retry(&fast(), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(OrderError::ProductNotFound("p-1".into())) }
        })
        .await;

        assert!(matches!(result, Err(OrderError::ProductNotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
