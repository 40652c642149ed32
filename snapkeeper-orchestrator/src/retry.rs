use snapkeeper_common::ProviderError;
use snapkeeper_providers::ProviderResult;
use std::future::Future;
use std::time::Duration;

/// Bounded retry with exponential backoff for transient provider errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero behaves like one.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before attempt `attempt + 1` (attempts are 1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exp)
    }
}

/// Retries idempotent calls on any transient error.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, op: &str, f: F) -> ProviderResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    with_retry_if(policy, op, ProviderError::is_transient, f).await
}

/// Retries only the errors `retryable` accepts. Non-idempotent calls pass
/// `ProviderError::is_throttling` so a request that may have landed is not re-sent.
pub async fn with_retry_if<T, P, F, Fut>(
    policy: &RetryPolicy,
    op: &str,
    retryable: P,
    mut f: F,
) -> ProviderResult<T>
where
    P: Fn(&ProviderError) -> bool,
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match f().await {
            Err(e) if retryable(&e) && attempt < max_attempts => {
                let delay = policy.backoff(attempt);
                tracing::warn!(
                    "🔄 [retry] {} failed ({}), attempt {}/{}; retrying in {:?}",
                    op,
                    e,
                    attempt,
                    max_attempts,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            res => return res,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    #[test]
    fn backoff_doubles() {
        let p = RetryPolicy::default();
        assert_eq!(p.backoff(1), Duration::from_millis(200));
        assert_eq!(p.backoff(2), Duration::from_millis(400));
        assert_eq!(p.backoff(3), Duration::from_millis(800));
    }

    #[tokio::test]
    async fn transient_errors_are_retried_until_success() {
        let calls = &AtomicU32::new(0);
        let res = with_retry(&fast(3), "op", move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(ProviderError::api("RequestLimitExceeded", "slow down"))
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(res, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let res: ProviderResult<()> = with_retry(&fast(2), "op", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Transport("connection reset".into()))
        })
        .await;
        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let res: ProviderResult<()> = with_retry(&fast(5), "op", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::api("InvalidSnapshot.InUse", "in use"))
        })
        .await;
        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn throttling_only_predicate_skips_transport_errors() {
        let calls = &AtomicU32::new(0);
        let res: ProviderResult<()> = with_retry_if(
            &fast(5),
            "create_image",
            ProviderError::is_throttling,
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::Transport("request timed out".into()))
            },
        )
        .await;
        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
