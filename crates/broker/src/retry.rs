use std::future::Future;
use std::time::Duration;

use crate::error::BrokerError;

/// Runs a fallible broker call with bounded exponential backoff.
///
/// Only transient errors are retried; a rejection or an unknown order id
/// is returned immediately. `max_retries` counts retries, so the call is
/// attempted at most `max_retries + 1` times.
pub async fn with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_ms: u64,
    operation: &str,
    mut call: F,
) -> Result<T, BrokerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BrokerError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < max_retries => {
                attempt += 1;
                let delay = backoff_ms.saturating_mul(1u64 << (attempt - 1).min(16));
                tracing::warn!(
                    operation,
                    attempt,
                    max_retries,
                    delay_ms = delay,
                    error = %err,
                    "transient broker error, retrying"
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_backoff(3, 1, "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(BrokerError::Transient("requote".into()))
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_the_retry_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_backoff(2, 1, "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(BrokerError::Transient("timeout".into()))
        })
        .await;
        assert!(matches!(result, Err(BrokerError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rejections_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_backoff(5, 1, "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(BrokerError::Rejected("margin".into()))
        })
        .await;
        assert!(matches!(result, Err(BrokerError::Rejected(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
