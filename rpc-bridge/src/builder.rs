//! Builder for the bridge runtime.
//!
//! Provides a fluent API for configuring and building a [`Bridge`].

use std::time::Duration;

use crate::bridge::Bridge;

/// Default name prefix for runtime worker threads.
const DEFAULT_THREAD_NAME: &str = "rpc-bridge";

/// Default bound on the shutdown wait.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Builder for creating a [`Bridge`].
///
/// # Example
///
/// ```ignore
/// use rpc_bridge::BridgeBuilder;
/// use std::time::Duration;
///
/// let bridge = BridgeBuilder::new()
///     .worker_threads(2)
///     .thread_name("wallet-rpc")
///     .shutdown_timeout(Duration::from_secs(1))
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct BridgeBuilder {
    /// Number of runtime worker threads. `None` uses one per CPU core.
    worker_threads: Option<usize>,
    /// Name given to runtime worker threads.
    thread_name: String,
    /// Bound on the shutdown wait.
    shutdown_timeout: Duration,
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeBuilder {
    /// Create a new BridgeBuilder with default settings.
    pub fn new() -> Self {
        Self {
            worker_threads: None,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Set the number of runtime worker threads.
    ///
    /// Must be at least one.
    pub fn worker_threads(mut self, count: usize) -> Self {
        self.worker_threads = Some(count);
        self
    }

    /// Set the name given to runtime worker threads.
    pub fn thread_name<S: Into<String>>(mut self, name: S) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Set how long [`Bridge::shutdown`] waits for blocking work to stop.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Build the bridge, starting its runtime.
    pub fn build(self) -> Result<Bridge, BuildError> {
        let mut runtime = tokio::runtime::Builder::new_multi_thread();
        runtime.enable_all().thread_name(self.thread_name.clone());

        if let Some(count) = self.worker_threads {
            if count == 0 {
                return Err(BuildError::InvalidWorkerThreads(count));
            }
            runtime.worker_threads(count);
        }

        let runtime = runtime.build()?;

        tracing::debug!(
            thread_name = %self.thread_name,
            worker_threads = ?self.worker_threads,
            "bridge runtime started"
        );

        Ok(Bridge::new(runtime, self.shutdown_timeout))
    }
}

/// Error building a [`Bridge`].
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The worker thread count was zero.
    #[error("invalid worker thread count: {0}")]
    InvalidWorkerThreads(usize),

    /// The runtime could not be started.
    #[error("failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}
