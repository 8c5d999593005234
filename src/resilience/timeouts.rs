//! Timeout enforcement.

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use crate::client::{RpcError, RpcResult};

/// Run a remote call under `budget`, mapping expiry to [`RpcError::Timeout`].
pub async fn with_timeout<T, F>(server: &str, budget: Duration, call: F) -> RpcResult<T>
where
    F: Future<Output = RpcResult<T>>,
{
    match timeout(budget, call).await {
        Ok(result) => result,
        Err(_) => Err(RpcError::Timeout {
            server: server.to_string(),
            timeout: budget,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_passes_result_through() {
        let result = with_timeout("http://a", Duration::from_secs(1), async { Ok::<_, RpcError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_expiry_is_timeout() {
        let result: RpcResult<()> = with_timeout("http://slow", Duration::from_millis(20), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        let err = result.unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().starts_with("http://slow"));
    }
}
