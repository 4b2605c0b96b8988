//! Bidirectional-streaming call handler.
//!
//! A bidi session has two independent paths:
//! - the host sends requests through a [`SendHandle`]
//! - a background task pulls responses into the host's [`StreamSink`]
//!
//! The two paths share only the session's [`CancelScope`]. On a terminal
//! condition the receive loop cancels the scope first, so a send blocked on
//! the transport fails. Only then is the connection released and the
//! terminal error delivered.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rpc_bridge_core::{Error, MessageCodec, StreamError};
use tracing::{Instrument, info_span};

use super::server_stream::pump;
use crate::bridge::Executor;
use crate::connection::ConnectionProvider;
use crate::method::BidiStreamMethod;
use crate::scope::CancelScope;
use crate::sink::{PendingStream, StreamSink};
use crate::stream::Sender;

/// Host-facing send side of a bidirectional call.
pub trait SendStream: Send + Sync {
    /// Decode one serialized request and send it.
    ///
    /// Blocks until the transport accepts the request. Fails without
    /// blocking once [`stop`](SendStream::stop) has been called.
    ///
    /// May be called from a sink callback, for example to reply from
    /// [`StreamSink::on_success`]. The callback's worker thread is handed
    /// off while the send waits.
    fn send(&self, request: &[u8]) -> Result<(), Error>;

    /// Close the send side of the call.
    ///
    /// Responses keep arriving until the server finishes. Calling `stop`
    /// twice is an error.
    fn stop(&self) -> Result<(), Error>;
}

/// Drives bidirectional-streaming calls for one method.
pub struct BidiStreamHandler<P, C, M> {
    executor: Executor,
    provider: Arc<P>,
    codec: Arc<C>,
    method: Arc<M>,
}

impl<P, C, M> Clone for BidiStreamHandler<P, C, M> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            provider: self.provider.clone(),
            codec: self.codec.clone(),
            method: self.method.clone(),
        }
    }
}

impl<P, C, M: BidiStreamMethod> fmt::Debug for BidiStreamHandler<P, C, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BidiStreamHandler")
            .field("method", &self.method.name())
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

impl<P, C, M> BidiStreamHandler<P, C, M>
where
    P: ConnectionProvider,
    M: BidiStreamMethod<Client = P::Client>,
    C: MessageCodec<Request = M::Request, Response = M::Response>,
{
    /// Create a new handler.
    pub fn new(executor: Executor, provider: Arc<P>, codec: C, method: M) -> Self {
        Self {
            executor,
            provider,
            codec: Arc::new(codec),
            method: Arc::new(method),
        }
    }

    /// Open a call, blocking until it is established.
    ///
    /// On failure no background work is started and `sink` is dropped
    /// without being called.
    ///
    /// May be called from a sink callback. In other asynchronous code use
    /// [`start_async`](BidiStreamHandler::start_async).
    ///
    /// # Panics
    ///
    /// Panics when called from within a current-thread runtime.
    pub fn start(&self, sink: Box<dyn StreamSink>) -> Result<SendHandle<C, M::Sender>, Error> {
        self.executor.block_on(self.start_async(sink))
    }

    /// Open a call.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let (sink, mut events) = stream_channel();
    /// let handle = handler.start_async(Box::new(sink)).await?;
    ///
    /// handle.send_async(&first).await?;
    /// handle.send_async(&second).await?;
    /// handle.stop()?;
    ///
    /// while let Some(event) = events.recv().await {
    ///     println!("{event:?}");
    /// }
    /// ```
    pub async fn start_async(
        &self,
        sink: Box<dyn StreamSink>,
    ) -> Result<SendHandle<C, M::Sender>, Error> {
        let scope = self.executor.session_scope();
        let span = info_span!(
            "rpc.call",
            rpc.method = %self.method.name(),
            rpc.type = "bidi_stream",
            otel.kind = "client",
        );

        let opened = async {
            let mut conn = scope
                .run(self.provider.acquire())
                .await
                .ok_or_else(Error::canceled)??;
            let (receiver, sender) = scope
                .run(self.method.open(conn.client_mut()))
                .await
                .ok_or_else(Error::canceled)??;
            Ok::<_, Error>((conn, receiver, sender))
        }
        .instrument(span.clone())
        .await;

        let (conn, mut receiver, sender) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                scope.cancel();
                span.in_scope(|| tracing::debug!(error = %e, "bidi stream failed to open"));
                return Err(e);
            }
        };

        let mut pending = PendingStream::new(sink);
        let codec = self.codec.clone();
        let loop_scope = scope.clone();

        self.executor.spawn(
            async move {
                let error = pump(&*codec, &loop_scope, &mut receiver, &mut pending).await;
                loop_scope.cancel();
                conn.release();

                if error.is_end_of_stream() {
                    tracing::debug!("bidi stream finished");
                } else {
                    tracing::debug!(error = %error, "bidi stream failed");
                }
                pending.terminate(error);
            }
            .instrument(span),
        );

        Ok(SendHandle {
            executor: self.executor.clone(),
            codec: self.codec.clone(),
            sender,
            scope,
            stopped: AtomicBool::new(false),
        })
    }
}

/// Send side of an open bidirectional call.
///
/// Dropping the handle without calling [`stop`](SendStream::stop) also
/// closes the send side.
pub struct SendHandle<C, S> {
    executor: Executor,
    codec: Arc<C>,
    sender: S,
    scope: CancelScope,
    stopped: AtomicBool,
}

impl<C, S> SendHandle<C, S>
where
    C: MessageCodec,
    S: Sender<Item = C::Request>,
{
    /// Decode one serialized request and send it.
    ///
    /// Fails with a cancellation error if the receive loop has already
    /// terminated the session, including while waiting on the transport.
    pub async fn send_async(&self, request: &[u8]) -> Result<(), Error> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(StreamError::SendAfterStop.into());
        }
        let request = self.codec.decode(request)?;

        self.scope
            .run(self.sender.send(request))
            .await
            .ok_or_else(Error::canceled)?
    }

    /// Check whether [`stop`](SendStream::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Check whether the session has terminated.
    pub fn is_terminated(&self) -> bool {
        self.scope.is_cancelled()
    }
}

impl<C, S> SendStream for SendHandle<C, S>
where
    C: MessageCodec,
    S: Sender<Item = C::Request>,
{
    fn send(&self, request: &[u8]) -> Result<(), Error> {
        self.executor.block_on(self.send_async(request))
    }

    fn stop(&self) -> Result<(), Error> {
        self.stopped.store(true, Ordering::Release);
        self.sender.close()
    }
}

impl<C, S> fmt::Debug for SendHandle<C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendHandle")
            .field("stopped", &self.stopped.load(Ordering::Acquire))
            .field("terminated", &self.scope.is_cancelled())
            .finish_non_exhaustive()
    }
}
