use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::metrics::FEED_SUBSCRIPTIONS_ACTIVE;

/// Handle to a live subscription.
///
/// The caller owns it. Releasing it (explicitly or by dropping it) stops the
/// background watcher, after which no snapshot can be observed.
pub struct Subscription<T> {
    rx: mpsc::Receiver<T>,
    task: JoinHandle<()>,
}

impl<T> Subscription<T> {
    pub(crate) fn new(rx: mpsc::Receiver<T>, task: JoinHandle<()>) -> Self {
        FEED_SUBSCRIPTIONS_ACTIVE.inc();
        Self { rx, task }
    }

    /// Wait for the next snapshot. `None` once the watcher has stopped.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    #[cfg(test)]
    pub(crate) fn abort_handle(&self) -> tokio::task::AbortHandle {
        self.task.abort_handle()
    }

    /// Stop watching.
    pub fn release(self) {
        drop(self);
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.rx.close();
        self.task.abort();
        FEED_SUBSCRIPTIONS_ACTIVE.dec();
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("finished", &self.task.is_finished())
            .finish()
    }
}
