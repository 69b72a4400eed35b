//! Cancellation plumbing shared by every suspension point of a call.

use crate::base::neterror::NetError;
use std::future::Future;
use std::time::Duration;
pub use tokio_util::sync::CancellationToken;

/// Run `fut` unless `token` fires first.
///
/// The token is checked before polling, so an already-cancelled call
/// never starts new I/O.
pub async fn abortable<F, T>(token: &CancellationToken, fut: F) -> Result<T, NetError>
where
    F: Future<Output = Result<T, NetError>>,
{
    if token.is_cancelled() {
        return Err(NetError::Aborted);
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(NetError::Aborted),
        result = fut => result,
    }
}

/// Sleep for `interval`, failing with `Aborted` if cancelled meanwhile.
pub async fn sleep(token: &CancellationToken, interval: Duration) -> Result<(), NetError> {
    abortable(token, async {
        tokio::time::sleep(interval).await;
        Ok(())
    })
    .await
}

/// Bound `fut` by an optional timeout, mapping expiry to `on_timeout`.
pub async fn bounded<F, T>(
    timeout: Option<Duration>,
    fut: F,
    on_timeout: impl FnOnce() -> NetError,
) -> Result<T, NetError>
where
    F: Future<Output = Result<T, NetError>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut).await.unwrap_or_else(|_| Err(on_timeout())),
        None => fut.await,
    }
}
