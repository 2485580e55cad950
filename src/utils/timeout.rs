//! Shared durations and async timeout helpers.

use std::future::Future;
use std::time::Duration;

/// Default time a disconnected queue may keep draining before force-close
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time an inbound stream may stay silent before it is treated as disconnected
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Run `fut`, returning `None` if it does not finish within `duration`
pub async fn with_timeout<F, T>(duration: Duration, fut: F) -> Option<T>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, fut).await.ok()
}
