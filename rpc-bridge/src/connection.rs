//! Connection acquisition for call sessions.
//!
//! A [`ConnectionProvider`] hands out a [`Connection`]: a transport client
//! paired with the routine that releases it. The connection is owned by
//! exactly one session path, and the release routine runs exactly once:
//! either through [`Connection::release`] or, on any other exit path, when
//! the connection is dropped.

use std::fmt;
use std::future::Future;

use rpc_bridge_core::Error;

type Release = Box<dyn FnOnce() + Send + 'static>;

/// Acquires live transport connections.
///
/// # Example
///
/// ```ignore
/// struct Loopback;
///
/// impl ConnectionProvider for Loopback {
///     type Client = LoopbackClient;
///
///     async fn acquire(&self) -> Result<Connection<LoopbackClient>, Error> {
///         let client = LoopbackClient::connect().await?;
///         Ok(Connection::new(client, || tracing::debug!("loopback closed")))
///     }
/// }
/// ```
pub trait ConnectionProvider: Send + Sync + 'static {
    /// The transport client a connection carries.
    type Client: Send + 'static;

    /// Acquire a new connection.
    fn acquire(&self) -> impl Future<Output = Result<Connection<Self::Client>, Error>> + Send;
}

/// A transport client together with its release routine.
pub struct Connection<C> {
    client: C,
    release: Option<Release>,
}

impl<C> Connection<C> {
    /// Pair a client with the routine that releases it.
    pub fn new<F>(client: C, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            client,
            release: Some(Box::new(release)),
        }
    }

    /// Get a reference to the client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Get a mutable reference to the client.
    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    /// Release the connection now.
    ///
    /// The client is dropped right after the release routine has run.
    pub fn release(mut self) {
        self.run_release();
    }

    fn run_release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl<C> Drop for Connection<C> {
    fn drop(&mut self) {
        self.run_release();
    }
}

impl<C> fmt::Debug for Connection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("released", &self.release.is_none())
            .finish_non_exhaustive()
    }
}
