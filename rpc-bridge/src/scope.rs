//! Cancellation scopes for call sessions.
//!
//! Every call session owns exactly one [`CancelScope`]. The scope is
//! write-once (it can only move from live to cancelled) and read-many: any
//! number of execution contexts may check it or wait on it. Session scopes
//! are created as children of the bridge's root scope, so shutting the
//! bridge down cancels every live session.

use std::future::Future;
use std::sync::Arc;

use futures::future::select_all;
use tokio::sync::watch;

#[derive(Debug)]
struct Inner {
    cancelled: watch::Sender<bool>,
    parent: Option<Arc<Inner>>,
}

/// A write-once cancellation signal, optionally linked to a parent scope.
///
/// Cloning a scope yields another handle to the same signal.
///
/// # Example
///
/// ```ignore
/// let root = CancelScope::new();
/// let session = root.child();
///
/// // Races the call against cancellation of `session` or `root`.
/// match session.run(remote_call()).await {
///     Some(result) => handle(result),
///     None => println!("canceled"),
/// }
/// ```
#[derive(Clone, Debug)]
pub struct CancelScope {
    inner: Arc<Inner>,
}

impl Default for CancelScope {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelScope {
    /// Create a new root scope.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: watch::Sender::new(false),
                parent: None,
            }),
        }
    }

    /// Create a child scope that is also cancelled when `self` is.
    ///
    /// Cancelling the child does not affect the parent.
    pub fn child(&self) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: watch::Sender::new(false),
                parent: Some(self.inner.clone()),
            }),
        }
    }

    /// Cancel this scope.
    ///
    /// Returns `true` if this call performed the cancellation and `false` if
    /// the scope was already cancelled.
    pub fn cancel(&self) -> bool {
        !self.inner.cancelled.send_replace(true)
    }

    /// Check whether this scope or any ancestor has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.ancestry().any(|inner| *inner.cancelled.borrow())
    }

    /// Wait until this scope or any ancestor is cancelled.
    pub async fn cancelled(&self) {
        let mut receivers: Vec<watch::Receiver<bool>> = self
            .ancestry()
            .map(|inner| inner.cancelled.subscribe())
            .collect();

        let waits = receivers.iter_mut().map(|rx| {
            Box::pin(async move {
                // The sender lives in `self`, so this only returns once the
                // value flips to true.
                let _ = rx.wait_for(|cancelled| *cancelled).await;
            })
        });
        select_all(waits).await;
    }

    /// Drive `fut` to completion unless the scope is cancelled first.
    ///
    /// Returns `None` if cancellation won. Cancellation is checked first, so
    /// an already-cancelled scope never polls `fut`.
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;

            _ = self.cancelled() => None,
            output = fut => Some(output),
        }
    }

    fn ancestry(&self) -> impl Iterator<Item = &Inner> {
        std::iter::successors(Some(&*self.inner), |inner| inner.parent.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cancel_is_write_once() {
        let scope = CancelScope::new();
        assert!(!scope.is_cancelled());
        assert!(scope.cancel());
        assert!(scope.is_cancelled());
        assert!(!scope.cancel());
        assert!(scope.is_cancelled());
    }

    #[test]
    fn test_clones_share_the_signal() {
        let scope = CancelScope::new();
        let other = scope.clone();
        other.cancel();
        assert!(scope.is_cancelled());
    }

    #[test]
    fn test_parent_cancels_child() {
        let root = CancelScope::new();
        let child = root.child();
        let grandchild = child.child();

        root.cancel();
        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
    }

    #[test]
    fn test_child_does_not_cancel_parent() {
        let root = CancelScope::new();
        let child = root.child();
        let sibling = root.child();

        child.cancel();
        assert!(!root.is_cancelled());
        assert!(!sibling.is_cancelled());
    }

    #[tokio::test]
    async fn test_run_completes_when_live() {
        let scope = CancelScope::new();
        assert_eq!(scope.run(async { 7 }).await, Some(7));
    }

    #[tokio::test]
    async fn test_run_on_cancelled_scope_skips_future() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let scope = CancelScope::new();
        scope.cancel();
        let polled = AtomicBool::new(false);
        let out = scope
            .run(async {
                polled.store(true, Ordering::SeqCst);
                1
            })
            .await;
        assert_eq!(out, None);
        assert!(!polled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_run_unblocks_pending_future() {
        let root = CancelScope::new();
        let scope = root.child();

        let waiter = tokio::spawn({
            let scope = scope.clone();
            async move { scope.run(futures::future::pending::<()>()).await }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        root.cancel();

        let out = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out, None);
    }
}
