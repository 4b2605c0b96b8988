//! Server-streaming call handler.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use rpc_bridge_core::{Error, MessageCodec};
use tracing::{Instrument, info_span};

use crate::bridge::Executor;
use crate::connection::ConnectionProvider;
use crate::method::ServerStreamMethod;
use crate::scope::CancelScope;
use crate::sink::{PendingStream, StreamSink};
use crate::stream::Receiver;

/// Drives server-streaming calls for one method.
///
/// Each [`start`](ServerStreamHandler::start) delivers zero or more
/// responses followed by exactly one terminal error to its sink. A stream
/// the server finishes cleanly terminates with an end-of-stream error.
pub struct ServerStreamHandler<P, C, M> {
    executor: Executor,
    provider: Arc<P>,
    codec: Arc<C>,
    method: Arc<M>,
}

impl<P, C, M> Clone for ServerStreamHandler<P, C, M> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            provider: self.provider.clone(),
            codec: self.codec.clone(),
            method: self.method.clone(),
        }
    }
}

impl<P, C, M: ServerStreamMethod> fmt::Debug for ServerStreamHandler<P, C, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerStreamHandler")
            .field("method", &self.method.name())
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

impl<P, C, M> ServerStreamHandler<P, C, M>
where
    P: ConnectionProvider,
    M: ServerStreamMethod<Client = P::Client>,
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

    /// Start a call.
    ///
    /// Returns immediately; the request bytes are copied first. Responses
    /// arrive on `sink` in the order the server produced them.
    pub fn start(&self, request: &[u8], sink: Box<dyn StreamSink>) {
        let request = Bytes::copy_from_slice(request);
        let mut pending = PendingStream::new(sink);
        let scope = self.executor.session_scope();

        let span = info_span!(
            "rpc.call",
            rpc.method = %self.method.name(),
            rpc.type = "server_stream",
            otel.kind = "client",
        );

        let provider = self.provider.clone();
        let codec = self.codec.clone();
        let method = self.method.clone();

        self.executor.spawn(
            async move {
                let error = call(&*provider, &*codec, &*method, &scope, request, &mut pending).await;
                scope.cancel();

                if error.is_end_of_stream() {
                    tracing::debug!("server stream finished");
                } else {
                    tracing::debug!(error = %error, "server stream failed");
                }
                pending.terminate(error);
            }
            .instrument(span),
        );
    }
}

/// One server-streaming session, returning its terminal error. The
/// connection is released before this returns.
async fn call<P, C, M>(
    provider: &P,
    codec: &C,
    method: &M,
    scope: &CancelScope,
    request: Bytes,
    sink: &mut PendingStream,
) -> Error
where
    P: ConnectionProvider,
    M: ServerStreamMethod<Client = P::Client>,
    C: MessageCodec<Request = M::Request, Response = M::Response>,
{
    let request = match codec.decode(&request) {
        Ok(request) => request,
        Err(e) => return e,
    };

    let mut conn = match scope.run(provider.acquire()).await {
        Some(Ok(conn)) => conn,
        Some(Err(e)) => return e,
        None => return Error::canceled(),
    };

    let error = match scope.run(method.open(conn.client_mut(), request)).await {
        Some(Ok(mut responses)) => pump(codec, scope, &mut responses, sink).await,
        Some(Err(e)) => e,
        None => Error::canceled(),
    };
    conn.release();
    error
}

/// Pull responses into `sink` until the first failure, which is returned.
pub(super) async fn pump<C, R>(
    codec: &C,
    scope: &CancelScope,
    responses: &mut R,
    sink: &mut PendingStream,
) -> Error
where
    C: MessageCodec,
    R: Receiver<Item = C::Response>,
{
    loop {
        let response = match scope.run(responses.recv()).await {
            Some(Ok(response)) => response,
            Some(Err(e)) => return e,
            None => return Error::canceled(),
        };
        match codec.encode(&response) {
            Ok(bytes) => sink.message(bytes),
            Err(e) => return e,
        }
    }
}
