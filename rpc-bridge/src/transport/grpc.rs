//! Call strategies over `tonic::client::Grpc`.
//!
//! Messages are protobuf-encoded with `tonic_prost::ProstCodec`. Each
//! strategy waits for the channel to be ready before calling.

use std::marker::PhantomData;

use http::uri::PathAndQuery;
use rpc_bridge_core::{Code, Error, StreamError};
use tonic::Status;
use tonic::client::Grpc;
use tonic::transport::Channel;
use tonic_prost::ProstCodec;

use crate::method::{BidiStreamMethod, ServerStreamMethod, UnaryMethod};
use crate::stream::{ChannelSender, Receiver, request_channel};

// ============================================================================
// Status mapping
// ============================================================================

fn code_of(status: &Status) -> Code {
    Code::from_i32(status.code() as i32)
}

/// Error for a call that was rejected or failed before yielding a response.
pub(crate) fn invoke_error(status: Status) -> Error {
    Error::invoke(code_of(&status), status.message())
}

/// Error for a response stream that failed after opening.
pub(crate) fn stream_error(status: Status) -> Error {
    StreamError::Status {
        code: code_of(&status),
        message: status.message().to_string(),
    }
    .into()
}

/// Parse a method path such as `/echo.Echo/Say`.
pub(crate) fn method_path(path: &str) -> Result<PathAndQuery, Error> {
    if !path.starts_with('/') {
        return Err(Error::invoke(
            Code::InvalidArgument,
            format!("method path must start with '/': {path}"),
        ));
    }
    PathAndQuery::try_from(path).map_err(|e| {
        Error::invoke(Code::InvalidArgument, format!("invalid method path {path}: {e}"))
    })
}

async fn ready(client: &mut Grpc<Channel>) -> Result<(), Error> {
    client
        .ready()
        .await
        .map_err(|e| Error::Connect(format!("service was not ready: {e}")))
}

impl<T: Send + 'static> Receiver for tonic::Streaming<T> {
    type Item = T;

    async fn recv(&mut self) -> Result<T, Error> {
        match self.message().await {
            Ok(Some(message)) => Ok(message),
            Ok(None) => Err(Error::end_of_stream()),
            Err(status) => Err(stream_error(status)),
        }
    }
}

// ============================================================================
// Strategies
// ============================================================================

/// Unary gRPC method.
#[derive(Debug)]
pub struct GrpcUnary<Req, Res> {
    path: PathAndQuery,
    _marker: PhantomData<fn() -> (Req, Res)>,
}

impl<Req, Res> GrpcUnary<Req, Res> {
    /// Create a strategy calling `path`.
    pub fn new(path: PathAndQuery) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }
}

impl<Req, Res> UnaryMethod for GrpcUnary<Req, Res>
where
    Req: prost::Message + Sync + 'static,
    Res: prost::Message + Default + Sync + 'static,
{
    type Client = Grpc<Channel>;
    type Request = Req;
    type Response = Res;

    fn name(&self) -> &str {
        self.path.path()
    }

    async fn invoke(&self, client: &mut Grpc<Channel>, request: Req) -> Result<Res, Error> {
        ready(client).await?;
        let response = client
            .unary(
                tonic::Request::new(request),
                self.path.clone(),
                ProstCodec::default(),
            )
            .await
            .map_err(invoke_error)?;
        Ok(response.into_inner())
    }
}

/// Server-streaming gRPC method.
#[derive(Debug)]
pub struct GrpcServerStream<Req, Res> {
    path: PathAndQuery,
    _marker: PhantomData<fn() -> (Req, Res)>,
}

impl<Req, Res> GrpcServerStream<Req, Res> {
    /// Create a strategy calling `path`.
    pub fn new(path: PathAndQuery) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }
}

impl<Req, Res> ServerStreamMethod for GrpcServerStream<Req, Res>
where
    Req: prost::Message + Sync + 'static,
    Res: prost::Message + Default + Sync + 'static,
{
    type Client = Grpc<Channel>;
    type Request = Req;
    type Response = Res;
    type Receiver = tonic::Streaming<Res>;

    fn name(&self) -> &str {
        self.path.path()
    }

    async fn open(
        &self,
        client: &mut Grpc<Channel>,
        request: Req,
    ) -> Result<tonic::Streaming<Res>, Error> {
        ready(client).await?;
        let response = client
            .server_streaming(
                tonic::Request::new(request),
                self.path.clone(),
                ProstCodec::default(),
            )
            .await
            .map_err(invoke_error)?;
        Ok(response.into_inner())
    }
}

/// Bidirectional-streaming gRPC method.
///
/// Requests flow through a bounded channel of `buffer` entries; closing the
/// returned [`ChannelSender`] half-closes the call.
#[derive(Debug)]
pub struct GrpcBidiStream<Req, Res> {
    path: PathAndQuery,
    buffer: usize,
    _marker: PhantomData<fn() -> (Req, Res)>,
}

impl<Req, Res> GrpcBidiStream<Req, Res> {
    /// Create a strategy calling `path`.
    pub fn new(path: PathAndQuery, buffer: usize) -> Self {
        Self {
            path,
            buffer,
            _marker: PhantomData,
        }
    }
}

impl<Req, Res> BidiStreamMethod for GrpcBidiStream<Req, Res>
where
    Req: prost::Message + Sync + 'static,
    Res: prost::Message + Default + Sync + 'static,
{
    type Client = Grpc<Channel>;
    type Request = Req;
    type Response = Res;
    type Receiver = tonic::Streaming<Res>;
    type Sender = ChannelSender<Req>;

    fn name(&self) -> &str {
        self.path.path()
    }

    async fn open(
        &self,
        client: &mut Grpc<Channel>,
    ) -> Result<(tonic::Streaming<Res>, ChannelSender<Req>), Error> {
        ready(client).await?;
        let (sender, requests) = request_channel(self.buffer);
        let response = client
            .streaming(
                tonic::Request::new(requests),
                self.path.clone(),
                ProstCodec::default(),
            )
            .await
            .map_err(invoke_error)?;
        Ok((response.into_inner(), sender))
    }
}
