//! Bounded retry with timeout and jittered backoff for external calls.

use std::future::Future;

use rand::Rng;

use crate::config::RetryPolicy;
use crate::error::LlmError;

/// Run `op` under the retry policy.
///
/// Each attempt is capped by `policy.timeout`; failed attempts are retried up
/// to `policy.max_retries` more times with jittered backoff in between.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    op_name: &str,
    mut op: F,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let attempts = policy.max_retries + 1;
    let mut last_reason = String::new();

    for attempt in 1..=attempts {
        match tokio::time::timeout(policy.timeout, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => {
                tracing::warn!(op = op_name, attempt, error = %e, "LLM call failed");
                last_reason = e.to_string();
            }
            Err(_) => {
                tracing::warn!(op = op_name, attempt, timeout = ?policy.timeout, "LLM call timed out");
                last_reason = LlmError::Timeout {
                    timeout: policy.timeout,
                }
                .to_string();
            }
        }

        if attempt < attempts {
            let base = policy.backoff * attempt;
            let jitter_ms = rand::thread_rng().gen_range(0..=base.as_millis() as u64 / 2);
            tokio::time::sleep(base + std::time::Duration::from_millis(jitter_ms)).await;
        }
    }

    Err(LlmError::RetriesExhausted {
        attempts,
        reason: last_reason,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(200),
            max_retries: 2,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn succeeds_first_try() {
        let result = with_retry(&fast_policy(), "test", || async { Ok::<_, LlmError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(LlmError::RequestFailed {
                        provider: "mock".to_string(),
                        reason: "transient".to_string(),
                    })
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_retry_budget() {
        let result: Result<(), _> = with_retry(&fast_policy(), "test", || async {
            Err(LlmError::RequestFailed {
                provider: "mock".to_string(),
                reason: "always".to_string(),
            })
        })
        .await;
        match result {
            Err(LlmError::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected RetriesExhausted, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn timeout_counts_as_failure() {
        let policy = RetryPolicy {
            timeout: Duration::from_millis(10),
            max_retries: 0,
            backoff: Duration::from_millis(1),
        };
        let result: Result<(), _> = with_retry(&policy, "test", || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(LlmError::RetriesExhausted { .. })));
    }
}
