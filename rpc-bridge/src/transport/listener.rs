//! In-process listener for a gRPC server.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use futures::Stream;
use rpc_bridge_core::Error;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;

/// An in-process listener.
///
/// Each [`dial`](MemoryListener::dial) creates a duplex pipe: the caller
/// keeps one end and the other is delivered through the listener's
/// [`Incoming`] stream, which a tonic server accepts with
/// `serve_with_incoming`.
///
/// Cloning a listener yields another handle to the same listener.
///
/// # Example
///
/// ```ignore
/// let listener = MemoryListener::new();
/// let incoming = listener.incoming().expect("first call");
///
/// tokio::spawn(
///     Server::builder()
///         .add_service(EchoServer::new(EchoImpl))
///         .serve_with_incoming(incoming),
/// );
///
/// let connector = MemoryConnector::new(listener.clone());
/// ```
#[derive(Clone, Debug)]
pub struct MemoryListener {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    tx: Mutex<Option<mpsc::UnboundedSender<DuplexStream>>>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<DuplexStream>>>,
}

impl Default for MemoryListener {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryListener {
    /// Create a new open listener.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                tx: Mutex::new(Some(tx)),
                rx: Mutex::new(Some(rx)),
            }),
        }
    }

    /// Take the stream of accepted connections.
    ///
    /// Returns `None` if it was already taken.
    pub fn incoming(&self) -> Option<Incoming> {
        self.inner
            .rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .map(|rx| Incoming { rx })
    }

    /// Open a connection to the listener.
    ///
    /// `buffer_size` is the capacity of each direction of the pipe in bytes.
    pub fn dial(&self, buffer_size: usize) -> Result<DuplexStream, Error> {
        let guard = self.inner.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = guard.as_ref() else {
            return Err(Error::Connect("listener is closed".into()));
        };

        let (local, remote) = tokio::io::duplex(buffer_size);
        tx.send(remote)
            .map_err(|_| Error::Connect("listener is no longer accepting connections".into()))?;
        Ok(local)
    }

    /// Close the listener.
    ///
    /// Later dials fail, and the [`Incoming`] stream ends once connections
    /// already dialed have been accepted. Established connections stay open.
    pub fn close(&self) {
        self.inner
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Check whether [`close`](MemoryListener::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// Stream of connections accepted by a [`MemoryListener`].
#[derive(Debug)]
pub struct Incoming {
    rx: mpsc::UnboundedReceiver<DuplexStream>,
}

impl Stream for Incoming {
    type Item = Result<DuplexStream, io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx).map(|conn| conn.map(Ok))
    }
}
