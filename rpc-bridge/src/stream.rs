//! Pull and push halves of an in-flight streaming call.
//!
//! - [`Receiver`]: pull the next typed response, or a terminal error
//! - [`Sender`]: push typed requests and close the request side
//!
//! [`Streaming`] adapts any `Stream` of results into a [`Receiver`], and
//! [`ChannelSender`] is a [`Sender`] backed by a bounded tokio channel whose
//! receiving half becomes the outbound request stream of a call.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use futures::{Stream, StreamExt};
use rpc_bridge_core::{Error, StreamError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Pull-based view of a response stream.
///
/// `recv` yields responses in production order. A clean end of stream is
/// reported as [`StreamError::EndOfStream`]. Once `recv` has returned an
/// error the receiver is finished and must not be polled again.
pub trait Receiver: Send + 'static {
    /// The typed response.
    type Item: Send + 'static;

    /// Wait for the next response.
    fn recv(&mut self) -> impl Future<Output = Result<Self::Item, Error>> + Send;
}

/// Push-based view of a request stream.
///
/// `send` may be called from a different execution context than the one
/// pulling the paired [`Receiver`]; the two halves need no mutual exclusion.
pub trait Sender: Send + Sync + 'static {
    /// The typed request.
    type Item: Send + 'static;

    /// Send one request, waiting for the transport to accept it.
    fn send(&self, item: Self::Item) -> impl Future<Output = Result<(), Error>> + Send;

    /// Close the request side of the stream.
    ///
    /// Closing twice is an error.
    fn close(&self) -> Result<(), Error>;
}

/// Wrapper that turns a stream of results into a [`Receiver`].
///
/// The first error or the end of the inner stream finishes the wrapper; any
/// later `recv` returns the same terminal error again without polling the
/// inner stream.
///
/// # Example
///
/// ```ignore
/// let mut responses = Streaming::new(futures::stream::iter(vec![
///     Ok("a".to_string()),
///     Ok("b".to_string()),
/// ]));
///
/// assert_eq!(responses.recv().await?, "a");
/// assert_eq!(responses.recv().await?, "b");
/// assert!(responses.recv().await.unwrap_err().is_end_of_stream());
/// ```
pub struct Streaming<S> {
    /// The underlying stream.
    inner: S,
    /// The terminal error, once observed.
    terminal: Option<Error>,
}

impl<S> Streaming<S> {
    /// Create a new Streaming wrapping the given stream.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            terminal: None,
        }
    }

    /// Get a reference to the inner stream.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Consume the wrapper and return the inner stream.
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Check if the stream has reached its terminal condition.
    pub fn is_finished(&self) -> bool {
        self.terminal.is_some()
    }
}

impl<S, T> Receiver for Streaming<S>
where
    S: Stream<Item = Result<T, Error>> + Unpin + Send + 'static,
    T: Send + 'static,
{
    type Item = T;

    async fn recv(&mut self) -> Result<T, Error> {
        if let Some(terminal) = &self.terminal {
            return Err(terminal.clone());
        }

        let error = match self.inner.next().await {
            Some(Ok(item)) => return Ok(item),
            Some(Err(error)) => error,
            None => Error::end_of_stream(),
        };
        self.terminal = Some(error.clone());
        Err(error)
    }
}

/// A [`Sender`] feeding a bounded channel.
///
/// Closing drops the channel's sending half, which ends the request stream
/// observed by the transport once queued requests have drained.
#[derive(Debug)]
pub struct ChannelSender<T> {
    tx: Mutex<Option<mpsc::Sender<T>>>,
}

impl<T> ChannelSender<T> {
    /// Wrap the sending half of a channel.
    pub fn new(tx: mpsc::Sender<T>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }

    /// Check whether [`Sender::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl<T: Send + 'static> Sender for ChannelSender<T> {
    type Item = T;

    async fn send(&self, item: T) -> Result<(), Error> {
        let tx = {
            let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
            guard.clone()
        };
        let Some(tx) = tx else {
            return Err(StreamError::SendAfterStop.into());
        };

        tx.send(item).await.map_err(|_| {
            StreamError::Disconnected("request stream is no longer consumed".into()).into()
        })
    }

    fn close(&self) -> Result<(), Error> {
        let mut guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.take() {
            Some(_) => Ok(()),
            None => Err(StreamError::AlreadyStopped.into()),
        }
    }
}

/// Create a [`ChannelSender`] and the request stream it feeds.
///
/// `buffer` is the number of requests that may be queued before `send`
/// waits for the transport.
pub fn request_channel<T>(buffer: usize) -> (ChannelSender<T>, ReceiverStream<T>) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (ChannelSender::new(tx), ReceiverStream::new(rx))
}
