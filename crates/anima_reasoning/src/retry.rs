//! Retry policy for completion calls.
//!
//! Deliberately narrow: one retry, with reduced parameters, only on
//! transient failures. Client-side errors fail immediately.

use reqwest::StatusCode;

/// Transient statuses worth one more attempt.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::INTERNAL_SERVER_ERROR
        || status == StatusCode::BAD_GATEWAY
        || status == StatusCode::SERVICE_UNAVAILABLE
        || status == StatusCode::GATEWAY_TIMEOUT
}

/// Run `op` once; on failure, run it once more with the degraded parameter
/// set produced by `degrade`. The second failure is returned to the caller.
pub async fn with_single_retry<T, P, F, Fut, D>(
    provider_name: &str,
    params: P,
    degrade: D,
    op: F,
) -> anyhow::Result<T>
where
    P: Clone,
    F: Fn(P) -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<T>>,
    D: FnOnce(&P) -> P,
{
    match op(params.clone()).await {
        Ok(v) => Ok(v),
        Err(first) => {
            let reduced = degrade(&params);
            tracing::warn!(
                "{} completion failed ({}), retrying once with reduced parameters",
                provider_name,
                first
            );
            op(reduced).await.map_err(|second| {
                tracing::warn!("{} retry also failed: {}", provider_name, second);
                second
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn test_success_needs_no_retry() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: anyhow::Result<u32> =
            with_single_retry("test", 100u32, |p| p / 2, |p| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(p)
            })
            .await;
        assert_eq!(result.unwrap(), 100);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_uses_degraded_params() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let result: anyhow::Result<u32> =
            with_single_retry("test", 100u32, |p| p / 2, |p| async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    anyhow::bail!("transient");
                }
                Ok(p)
            })
            .await;
        // Second attempt saw the degraded parameter
        assert_eq!(result.unwrap(), 50);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exactly_one_retry() {
        let calls = AtomicU32::new(0);
        let result: anyhow::Result<u32> =
            with_single_retry("test", 1u32, |p| *p, |_p| async {
                calls.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("still down")
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
