//! Host-supplied delivery targets.
//!
//! The host hands the bridge a sink together with every call it starts:
//! - [`CallbackSink`]: one-shot, receives a single result or a single error
//! - [`StreamSink`]: repeating, receives zero or more results followed by
//!   exactly one terminal error (a clean end of stream included)
//!
//! The terminal methods take `self: Box<Self>`, so a sink cannot be invoked
//! again after its terminal callback.
//!
//! For Rust hosts, [`callback_channel`] and [`stream_channel`] provide sinks
//! that forward deliveries into tokio channels.

use bytes::Bytes;
use rpc_bridge_core::{Code, Error};
use tokio::sync::{mpsc, oneshot};

/// One-shot delivery target for a unary call.
///
/// Exactly one of the two methods is called, exactly once.
pub trait CallbackSink: Send + 'static {
    /// Called with the serialized response.
    fn on_success(self: Box<Self>, response: Bytes);

    /// Called if any stage of the call failed.
    fn on_error(self: Box<Self>, error: Error);
}

/// Repeating delivery target for a streaming call.
///
/// `on_success` may be called any number of times (including zero) and is
/// always followed by exactly one `on_error`. A finite stream that ends
/// cleanly terminates with an error for which
/// [`Error::is_end_of_stream`] returns true.
pub trait StreamSink: Send + 'static {
    /// Called with each serialized response, in production order.
    fn on_success(&mut self, response: Bytes);

    /// Called once when the stream terminates. No calls follow.
    fn on_error(self: Box<Self>, error: Error);
}

/// Holds a [`CallbackSink`] until its result is delivered.
///
/// If the guard is dropped undelivered (for example because the executor
/// shut down before the session task ran), the sink receives a cancellation
/// error, so the host still observes exactly one callback.
pub(crate) struct PendingCallback {
    sink: Option<Box<dyn CallbackSink>>,
}

impl PendingCallback {
    pub(crate) fn new(sink: Box<dyn CallbackSink>) -> Self {
        Self { sink: Some(sink) }
    }

    pub(crate) fn deliver(mut self, result: Result<Bytes, Error>) {
        if let Some(sink) = self.sink.take() {
            match result {
                Ok(response) => sink.on_success(response),
                Err(error) => sink.on_error(error),
            }
        }
    }
}

impl Drop for PendingCallback {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.take() {
            tracing::warn!("call session dropped before delivering its result");
            sink.on_error(Error::invoke(
                Code::Canceled,
                "call session dropped before completion",
            ));
        }
    }
}

/// Holds a [`StreamSink`] until its terminal error is delivered.
///
/// Dropping the guard undelivered terminates the sink with
/// [`StreamError::Canceled`](rpc_bridge_core::StreamError::Canceled).
pub(crate) struct PendingStream {
    sink: Option<Box<dyn StreamSink>>,
}

impl PendingStream {
    pub(crate) fn new(sink: Box<dyn StreamSink>) -> Self {
        Self { sink: Some(sink) }
    }

    pub(crate) fn message(&mut self, response: Bytes) {
        if let Some(sink) = self.sink.as_mut() {
            sink.on_success(response);
        }
    }

    pub(crate) fn terminate(mut self, error: Error) {
        if let Some(sink) = self.sink.take() {
            sink.on_error(error);
        }
    }
}

impl Drop for PendingStream {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.take() {
            tracing::warn!("stream session dropped before delivering its terminal error");
            sink.on_error(Error::canceled());
        }
    }
}

// ============================================================================
// Channel-backed sinks
// ============================================================================

/// A [`CallbackSink`] that forwards its single delivery into a oneshot
/// channel. Created by [`callback_channel`].
#[derive(Debug)]
pub struct ChannelCallbackSink {
    tx: oneshot::Sender<Result<Bytes, Error>>,
}

impl CallbackSink for ChannelCallbackSink {
    fn on_success(self: Box<Self>, response: Bytes) {
        let _ = self.tx.send(Ok(response));
    }

    fn on_error(self: Box<Self>, error: Error) {
        let _ = self.tx.send(Err(error));
    }
}

/// Create a callback sink and the receiver its delivery arrives on.
///
/// # Example
///
/// ```ignore
/// let (sink, rx) = rpc_bridge::callback_channel();
/// handler.start(&request_bytes, Box::new(sink));
/// let response = rx.await??;
/// ```
pub fn callback_channel() -> (ChannelCallbackSink, oneshot::Receiver<Result<Bytes, Error>>) {
    let (tx, rx) = oneshot::channel();
    (ChannelCallbackSink { tx }, rx)
}

/// One delivery to a [`StreamSink`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// A serialized response.
    Message(Bytes),
    /// The terminal error. Nothing follows it.
    Terminated(Error),
}

impl StreamEvent {
    /// Returns true for the terminal event.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Terminated(_))
    }
}

/// A [`StreamSink`] that forwards deliveries into an unbounded channel.
/// Created by [`stream_channel`].
#[derive(Debug)]
pub struct ChannelStreamSink {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl StreamSink for ChannelStreamSink {
    fn on_success(&mut self, response: Bytes) {
        let _ = self.tx.send(StreamEvent::Message(response));
    }

    fn on_error(self: Box<Self>, error: Error) {
        let _ = self.tx.send(StreamEvent::Terminated(error));
    }
}

/// Create a stream sink and the receiver its deliveries arrive on.
///
/// The receiver yields every [`StreamEvent`] in delivery order and then
/// closes once the terminal event has been sent.
pub fn stream_channel() -> (ChannelStreamSink, mpsc::UnboundedReceiver<StreamEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelStreamSink { tx }, rx)
}
