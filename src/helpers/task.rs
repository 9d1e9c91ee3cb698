use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A spawned background loop plus the token that stops it.
///
/// Dropping the handle cancels the loop and aborts the task.
pub struct LoopHandle {
    name: &'static str,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl LoopHandle {
    /// Spawns `body` with a child of `parent`; cancelling the parent stops the loop too.
    pub fn spawn<F, Fut>(name: &'static str, parent: &CancellationToken, body: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let cancel = parent.child_token();
        let handle = tokio::spawn(body(cancel.clone()));
        info!("{} loop started", name);
        Self { name, cancel, handle: Some(handle) }
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancels the loop and waits up to `timeout` for it to exit, aborting it after that.
    pub async fn stop(mut self, timeout: Duration) {
        self.cancel.cancel();
        let Some(mut handle) = self.handle.take() else {
            return;
        };
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(_) => info!("{} loop stopped", self.name),
            Err(_) => {
                warn!("{} loop did not stop within {:?}, aborting", self.name, timeout);
                handle.abort();
            }
        }
    }
}

impl Drop for LoopHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Sleeps for `duration` unless `cancel` fires first. Returns `false` when cancelled.
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = cancel.cancelled() => false,
    }
}
