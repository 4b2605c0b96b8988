//! The managed executor call sessions run on.
//!
//! - [`Bridge`]: owns a tokio multi-thread runtime and the root
//!   [`CancelScope`]; built by [`BridgeBuilder`]
//! - [`Executor`]: cheap handle for spawning sessions and blocking on the
//!   runtime from host threads

use std::future::Future;
use std::time::Duration;

use tokio::runtime::{Handle, Runtime, RuntimeFlavor};
use tokio::task::JoinHandle;

use crate::builder::BridgeBuilder;
use crate::scope::CancelScope;

/// Handle to the runtime call sessions are spawned on.
///
/// Every session created through an executor gets a child of the
/// executor's root scope, so cancelling the root scope cancels all of them.
///
/// Cloning an executor yields another handle to the same runtime and root
/// scope.
#[derive(Clone, Debug)]
pub struct Executor {
    handle: Handle,
    scope: CancelScope,
}

impl Executor {
    /// Create an executor over an existing runtime.
    ///
    /// The runtime must be a multi-thread runtime: the synchronous entry
    /// points block the host thread while the runtime drives the transport.
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            handle,
            scope: CancelScope::new(),
        }
    }

    /// Create an executor over the runtime the caller is running on.
    ///
    /// Returns `None` outside of a tokio runtime.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::from_handle)
    }

    /// Get the runtime handle.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Get the root scope.
    pub fn scope(&self) -> &CancelScope {
        &self.scope
    }

    /// Create the scope for one new call session.
    pub(crate) fn session_scope(&self) -> CancelScope {
        self.scope.child()
    }

    /// Spawn a task onto the runtime.
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(fut)
    }

    /// Run a future to completion, blocking the current thread.
    ///
    /// On a worker thread of a multi-thread runtime, including the runtime's
    /// own workers while they run a sink callback, the worker is handed off
    /// with [`tokio::task::block_in_place`] for the duration of the call.
    ///
    /// # Panics
    ///
    /// Panics when called from within a current-thread runtime or a
    /// `LocalSet`.
    pub fn block_on<F: Future>(&self, fut: F) -> F::Output {
        match Handle::try_current() {
            Ok(current) if current.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| self.handle.block_on(fut))
            }
            _ => self.handle.block_on(fut),
        }
    }

    /// Check whether the root scope has been cancelled.
    pub fn is_shut_down(&self) -> bool {
        self.scope.is_cancelled()
    }
}

/// A managed runtime for call sessions.
///
/// Dropping the bridge is equivalent to calling [`Bridge::shutdown`].
/// Either may happen inside an asynchronous execution context, for example
/// from a sink callback; the runtime is then shut down in the background
/// without waiting.
///
/// # Example
///
/// ```ignore
/// let bridge = Bridge::builder().worker_threads(2).build()?;
/// let service = Service::new(bridge.executor().clone(), connector);
/// // ... start calls ...
/// bridge.shutdown();
/// ```
#[derive(Debug)]
pub struct Bridge {
    runtime: Option<Runtime>,
    executor: Executor,
    shutdown_timeout: Duration,
}

impl Bridge {
    /// Create a new BridgeBuilder.
    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::new()
    }

    pub(crate) fn new(runtime: Runtime, shutdown_timeout: Duration) -> Self {
        let executor = Executor::from_handle(runtime.handle().clone());
        Self {
            runtime: Some(runtime),
            executor,
            shutdown_timeout,
        }
    }

    /// Get the executor for this bridge.
    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Cancel every live session and stop the runtime.
    ///
    /// Session tasks still pending are dropped; their sinks receive a
    /// cancellation error from the delivery guard. The shutdown timeout
    /// bounds the wait for blocking work on the runtime. Inside an
    /// asynchronous execution context nothing is waited for.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(runtime) = self.runtime.take() else {
            return;
        };
        self.executor.scope.cancel();
        if Handle::try_current().is_ok() {
            tracing::debug!("bridge shutting down in the background");
            runtime.shutdown_background();
        } else {
            tracing::debug!(timeout = ?self.shutdown_timeout, "bridge shutting down");
            runtime.shutdown_timeout(self.shutdown_timeout);
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.stop();
    }
}
