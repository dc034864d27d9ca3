extern crate tokio;

use super::error::{Kind, Result};
use crate::config::retry::{RETRY_COUNT, RETRY_DELAY};
use std::future::Future;
use tokio::time::sleep;

/// Retries transient failures. Auth, lookup and shape errors are final on
/// the first occurrence; only `Generic` is worth another attempt.
pub(super) async fn async_retry<F, U, Out>(fun: F) -> Result<Out>
where
    F: Fn() -> U,
    U: Future<Output = Result<Out>>,
{
    for _ in 0..RETRY_COUNT - 1 {
        match fun().await {
            Ok(v) => return Ok(v),
            Err(e) => match e.kind() {
                Kind::Generic => sleep(RETRY_DELAY).await,
                _ => return Err(e),
            },
        }
    }
    fun().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_generic_until_success() {
        let calls = AtomicU32::new(0);
        let out = async_retry(|| async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(Error::new(Kind::Generic, "connection reset"))
            } else {
                Ok(7u32)
            }
        })
        .await;
        assert_eq!(out.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unauthorized_is_final() {
        let calls = AtomicU32::new(0);
        let out: Result<()> = async_retry(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::new(Kind::Unauthorized, "token expired"))
        })
        .await;
        assert_eq!(out.unwrap_err().kind(), Kind::Unauthorized);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
