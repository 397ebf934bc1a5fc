use std::{future::Future, time::Duration};

use rand::Rng;
use tracing::warn;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(20),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff for the given 1-based attempt, plus up to one base
    /// delay of jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as u64;
        let exp = base.saturating_mul(1u64 << attempt.saturating_sub(1).min(16));
        let jitter = if base > 0 {
            rand::thread_rng().gen_range(0..=base)
        } else {
            0
        };
        Duration::from_millis(exp.saturating_add(jitter))
    }
}

/// Runs `f` until it succeeds, fails with anything but `StorageConflict`, or
/// runs out of attempts.
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    op: &'static str,
    mut f: F,
) -> Result<T, CoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CoreError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match f().await {
            Err(CoreError::StorageConflict) if attempt < attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    op,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "storage conflict, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn conflict_then_success_is_retried() {
        let calls = &AtomicU32::new(0);
        let out = with_retry(fast(3), "test", || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(CoreError::StorageConflict)
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(out.expect("second attempt succeeds"), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let out: Result<(), _> = with_retry(fast(3), "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CoreError::StorageConflict)
        })
        .await;
        assert!(matches!(out, Err(CoreError::StorageConflict)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn terminal_errors_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let out: Result<(), _> = with_retry(fast(5), "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CoreError::DeadlineExpired)
        })
        .await;
        assert!(matches!(out, Err(CoreError::DeadlineExpired)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delay_grows_with_attempts() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(10),
        };
        let first = policy.delay_for(1);
        let third = policy.delay_for(3);
        assert!(first >= Duration::from_millis(10) && first <= Duration::from_millis(20));
        assert!(third >= Duration::from_millis(40) && third <= Duration::from_millis(50));
    }
}
