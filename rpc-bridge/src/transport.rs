//! In-memory gRPC transport.
//!
//! - [`MemoryListener`]: in-process listener feeding a tonic server
//! - [`MemoryConnector`]: [`ConnectionProvider`](crate::ConnectionProvider)
//!   dialing a listener
//! - [`GrpcUnary`], [`GrpcServerStream`], [`GrpcBidiStream`]: call strategies
//!   for protobuf methods

mod connector;
mod grpc;
mod listener;

pub use connector::MemoryConnector;
pub use grpc::{GrpcBidiStream, GrpcServerStream, GrpcUnary};
pub use listener::{Incoming, MemoryListener};

pub(crate) use grpc::method_path;
