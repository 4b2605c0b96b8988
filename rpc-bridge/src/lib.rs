//! Callback bridge for RPC services.
//!
//! `rpc-bridge` lets a host that can only exchange opaque bytes through
//! callback objects drive an RPC service in all three call shapes. The host
//! hands over serialized requests and a sink; the bridge acquires a
//! connection, decodes, calls, encodes and delivers, and tears everything
//! down again on every exit path.
//!
//! ## Call shapes
//!
//! - **Unary**: [`UnaryHandler::start`] delivers exactly one callback to a
//!   [`CallbackSink`]
//! - **Server streaming**: [`ServerStreamHandler::start`] delivers zero or
//!   more responses and then exactly one terminal error to a [`StreamSink`]
//! - **Bidirectional streaming**: [`BidiStreamHandler::start`] returns a
//!   [`SendHandle`] for requests while a background loop feeds responses
//!   into a [`StreamSink`]
//!
//! A cleanly finished stream terminates with an error for which
//! [`Error::is_end_of_stream`] returns true.
//!
//! ## Example
//!
//! ```ignore
//! use rpc_bridge::{Bridge, MemoryConnector, MemoryListener, Service, callback_channel};
//!
//! let bridge = Bridge::builder().worker_threads(2).build()?;
//! let listener = MemoryListener::new();
//! // serve a tonic server on `listener.incoming()` ...
//!
//! let service = Service::in_memory(bridge.executor().clone(), MemoryConnector::new(listener));
//! let say = service.unary::<SayRequest, SayResponse>("/echo.Echo/Say")?;
//!
//! let (sink, rx) = callback_channel();
//! say.start(&request_bytes, Box::new(sink));
//! ```
//!
//! ## Modules
//!
//! - [`transport`]: in-memory gRPC listener, connector and call strategies

mod bridge;
mod builder;
mod config;
mod connection;
mod handler;
mod method;
mod scope;
mod service;
mod sink;
mod stream;
pub mod transport;

#[cfg(test)]
mod testing;

pub use bridge::{Bridge, Executor};
pub use builder::{BridgeBuilder, BuildError};
pub use config::{ChannelOptions, DEFAULT_BUFFER_SIZE, DEFAULT_STREAM_BUFFER};
pub use connection::{Connection, ConnectionProvider};
pub use handler::{BidiStreamHandler, SendHandle, SendStream, ServerStreamHandler, UnaryHandler};
pub use method::{BidiStreamMethod, ServerStreamMethod, UnaryMethod};
pub use scope::CancelScope;
pub use service::{GrpcBidiStreamHandler, GrpcServerStreamHandler, GrpcUnaryHandler, Service};
pub use sink::{
    CallbackSink, ChannelCallbackSink, ChannelStreamSink, StreamEvent, StreamSink,
    callback_channel, stream_channel,
};
pub use stream::{ChannelSender, Receiver, Sender, Streaming, request_channel};
pub use transport::{MemoryConnector, MemoryListener};

// Re-export core types
pub use rpc_bridge_core::{Code, Error, JsonCodec, MessageCodec, ProtoCodec, StreamError};
