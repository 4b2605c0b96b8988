//! Per-method call strategies.
//!
//! Each remote method is described by one strategy value implementing the
//! trait for its call shape:
//! - [`UnaryMethod`]: one request, one response
//! - [`ServerStreamMethod`]: one request, a [`Receiver`] of responses
//! - [`BidiStreamMethod`]: a [`Receiver`] of responses and a [`Sender`] of
//!   requests
//!
//! Strategies are parameterized by the method's typed request and response
//! and by the transport client they call through. They hold no session
//! state; handlers pass the session's client in on every call.
//!
//! See [`transport`](crate::transport) for the gRPC implementations.

use std::future::Future;

use rpc_bridge_core::Error;

use crate::stream::{Receiver, Sender};

/// Strategy for a unary method.
pub trait UnaryMethod: Send + Sync + 'static {
    /// The transport client the method is called through.
    type Client: Send + 'static;
    /// The typed request.
    type Request: Send + 'static;
    /// The typed response.
    type Response: Send + 'static;

    /// Full method name, used for tracing.
    fn name(&self) -> &str;

    /// Invoke the method and wait for its response.
    fn invoke(
        &self,
        client: &mut Self::Client,
        request: Self::Request,
    ) -> impl Future<Output = Result<Self::Response, Error>> + Send;
}

/// Strategy for a server-streaming method.
pub trait ServerStreamMethod: Send + Sync + 'static {
    /// The transport client the method is called through.
    type Client: Send + 'static;
    /// The typed request.
    type Request: Send + 'static;
    /// The typed response.
    type Response: Send + 'static;
    /// The response stream.
    type Receiver: Receiver<Item = Self::Response>;

    /// Full method name, used for tracing.
    fn name(&self) -> &str;

    /// Invoke the method and return its response stream.
    fn open(
        &self,
        client: &mut Self::Client,
        request: Self::Request,
    ) -> impl Future<Output = Result<Self::Receiver, Error>> + Send;
}

/// Strategy for a bidirectional-streaming method.
pub trait BidiStreamMethod: Send + Sync + 'static {
    /// The transport client the method is called through.
    type Client: Send + 'static;
    /// The typed request.
    type Request: Send + 'static;
    /// The typed response.
    type Response: Send + 'static;
    /// The response stream.
    type Receiver: Receiver<Item = Self::Response>;
    /// The request stream.
    type Sender: Sender<Item = Self::Request>;

    /// Full method name, used for tracing.
    fn name(&self) -> &str;

    /// Open the call, returning both halves.
    fn open(
        &self,
        client: &mut Self::Client,
    ) -> impl Future<Output = Result<(Self::Receiver, Self::Sender), Error>> + Send;
}
