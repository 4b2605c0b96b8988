//! Call-pattern handlers.
//!
//! Each handler drives one method for any number of concurrent sessions:
//! - [`UnaryHandler`]: one request, one callback
//! - [`ServerStreamHandler`]: one request, a stream of callbacks
//! - [`BidiStreamHandler`]: a [`SendHandle`] for requests, a stream of
//!   callbacks for responses
//!
//! Failures are reported in stage order (decode, connect, invoke, receive,
//! encode); the first one ends the session. Nothing is retried.

mod bidi;
mod server_stream;
mod unary;

pub use bidi::{BidiStreamHandler, SendHandle, SendStream};
pub use server_stream::ServerStreamHandler;
pub use unary::UnaryHandler;
