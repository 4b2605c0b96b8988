//! Per-method handler construction for gRPC services.

use std::sync::Arc;

use rpc_bridge_core::{Error, ProtoCodec};
use tonic::client::Grpc;
use tonic::transport::Channel;

use crate::bridge::Executor;
use crate::config::DEFAULT_STREAM_BUFFER;
use crate::connection::ConnectionProvider;
use crate::handler::{BidiStreamHandler, ServerStreamHandler, UnaryHandler};
use crate::transport::{GrpcBidiStream, GrpcServerStream, GrpcUnary, MemoryConnector, method_path};

/// Handler for a unary protobuf method.
pub type GrpcUnaryHandler<P, Req, Res> = UnaryHandler<P, ProtoCodec<Req, Res>, GrpcUnary<Req, Res>>;

/// Handler for a server-streaming protobuf method.
pub type GrpcServerStreamHandler<P, Req, Res> =
    ServerStreamHandler<P, ProtoCodec<Req, Res>, GrpcServerStream<Req, Res>>;

/// Handler for a bidirectional-streaming protobuf method.
pub type GrpcBidiStreamHandler<P, Req, Res> =
    BidiStreamHandler<P, ProtoCodec<Req, Res>, GrpcBidiStream<Req, Res>>;

/// Builds handlers for the methods of one gRPC service.
///
/// All handlers built from a service share its executor and connection
/// provider; every session still acquires its own connection.
///
/// # Example
///
/// ```ignore
/// let listener = MemoryListener::new();
/// let service = Service::in_memory(bridge.executor().clone(), MemoryConnector::new(listener));
///
/// let say = service.unary::<SayRequest, SayResponse>("/echo.Echo/Say")?;
/// let (sink, rx) = callback_channel();
/// say.start(&request.encode_to_vec(), Box::new(sink));
/// ```
#[derive(Debug)]
pub struct Service<P> {
    executor: Executor,
    provider: Arc<P>,
    stream_buffer: usize,
}

impl<P> Clone for Service<P> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            provider: self.provider.clone(),
            stream_buffer: self.stream_buffer,
        }
    }
}

impl Service<MemoryConnector> {
    /// Create a service over an in-memory connector, taking the bidi request
    /// queue depth from the connector's options.
    pub fn in_memory(executor: Executor, connector: MemoryConnector) -> Self {
        let stream_buffer = connector.options().get_stream_buffer();
        Self::new(executor, connector).stream_buffer(stream_buffer)
    }
}

impl<P> Service<P>
where
    P: ConnectionProvider<Client = Grpc<Channel>>,
{
    /// Create a service over any gRPC connection provider.
    pub fn new(executor: Executor, provider: P) -> Self {
        Self {
            executor,
            provider: Arc::new(provider),
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }

    /// Set how many bidi requests may be queued before `send` waits.
    pub fn stream_buffer(mut self, depth: usize) -> Self {
        self.stream_buffer = depth.max(1);
        self
    }

    /// Build the handler for a unary method such as `/pkg.Service/Method`.
    pub fn unary<Req, Res>(&self, path: &str) -> Result<GrpcUnaryHandler<P, Req, Res>, Error>
    where
        Req: prost::Message + Default + Sync + 'static,
        Res: prost::Message + Default + Sync + 'static,
    {
        Ok(UnaryHandler::new(
            self.executor.clone(),
            self.provider.clone(),
            ProtoCodec::new(),
            GrpcUnary::new(method_path(path)?),
        ))
    }

    /// Build the handler for a server-streaming method.
    pub fn server_stream<Req, Res>(
        &self,
        path: &str,
    ) -> Result<GrpcServerStreamHandler<P, Req, Res>, Error>
    where
        Req: prost::Message + Default + Sync + 'static,
        Res: prost::Message + Default + Sync + 'static,
    {
        Ok(ServerStreamHandler::new(
            self.executor.clone(),
            self.provider.clone(),
            ProtoCodec::new(),
            GrpcServerStream::new(method_path(path)?),
        ))
    }

    /// Build the handler for a bidirectional-streaming method.
    pub fn bidi_stream<Req, Res>(
        &self,
        path: &str,
    ) -> Result<GrpcBidiStreamHandler<P, Req, Res>, Error>
    where
        Req: prost::Message + Default + Sync + 'static,
        Res: prost::Message + Default + Sync + 'static,
    {
        Ok(BidiStreamHandler::new(
            self.executor.clone(),
            self.provider.clone(),
            ProtoCodec::new(),
            GrpcBidiStream::new(method_path(path)?, self.stream_buffer),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelOptions;
    use crate::transport::MemoryListener;
    use rpc_bridge_core::Code;

    #[test]
    fn test_in_memory_uses_connector_stream_buffer() {
        let bridge = crate::testing::bridge();
        let connector =
            MemoryConnector::with_options(MemoryListener::new(), ChannelOptions::new().stream_buffer(7));
        let service = Service::in_memory(bridge.executor().clone(), connector);
        assert_eq!(service.stream_buffer, 7);
    }

    #[test]
    fn test_invalid_path_is_rejected() {
        let bridge = crate::testing::bridge();
        let service = Service::new(
            bridge.executor().clone(),
            MemoryConnector::new(MemoryListener::new()),
        );
        let err = service.unary::<String, String>("no-leading-slash").unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);
    }
}
