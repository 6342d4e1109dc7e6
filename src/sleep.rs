//! Timer primitives: fixed waits and predicate polling.
//!
//! Everything here is a thin layer over `tokio::time`, so the helpers
//! honour a paused test clock just like the rest of the runtime.

use std::time::Duration;

/// Default polling interval for [`until`] callers that have no preference.
pub const DEFAULT_TICK: Duration = Duration::from_millis(500);

/// Wait for `duration`.
pub async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await;
}

/// Suspend the caller until `condition` returns true.
///
/// The condition is checked immediately and then once per `tick`. It is
/// never evaluated concurrently with itself.
pub async fn until<F>(mut condition: F, tick: Duration)
where
    F: FnMut() -> bool,
{
    loop {
        if condition() {
            return;
        }
        tokio::time::sleep(tick).await;
    }
}

/// A future that never completes.
pub async fn forever() {
    std::future::pending::<()>().await;
}
