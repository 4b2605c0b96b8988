//! Unary call handler.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use rpc_bridge_core::{Code, Error, MessageCodec};
use tracing::{Instrument, info_span};

use crate::bridge::Executor;
use crate::connection::ConnectionProvider;
use crate::method::UnaryMethod;
use crate::scope::CancelScope;
use crate::sink::{CallbackSink, PendingCallback};

/// Drives unary calls for one method.
///
/// Each [`start`](UnaryHandler::start) is an independent session: it gets
/// its own connection and cancellation scope and delivers exactly one
/// callback to its sink.
///
/// # Example
///
/// ```ignore
/// let handler = UnaryHandler::new(executor, provider, ProtoCodec::new(), method);
/// let (sink, rx) = callback_channel();
/// handler.start(&request_bytes, Box::new(sink));
/// ```
pub struct UnaryHandler<P, C, M> {
    executor: Executor,
    provider: Arc<P>,
    codec: Arc<C>,
    method: Arc<M>,
}

impl<P, C, M> Clone for UnaryHandler<P, C, M> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            provider: self.provider.clone(),
            codec: self.codec.clone(),
            method: self.method.clone(),
        }
    }
}

impl<P, C, M: UnaryMethod> fmt::Debug for UnaryHandler<P, C, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnaryHandler")
            .field("method", &self.method.name())
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

impl<P, C, M> UnaryHandler<P, C, M>
where
    P: ConnectionProvider,
    M: UnaryMethod<Client = P::Client>,
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
    /// Returns immediately. The request bytes are copied before this
    /// returns, so the caller may reuse its buffer. The result arrives on
    /// `sink`: `on_success` with the encoded response, or `on_error` with
    /// the first failure among decode, connect, invoke and encode.
    pub fn start(&self, request: &[u8], sink: Box<dyn CallbackSink>) {
        let request = Bytes::copy_from_slice(request);
        let pending = PendingCallback::new(sink);
        let scope = self.executor.session_scope();

        let span = info_span!(
            "rpc.call",
            rpc.method = %self.method.name(),
            rpc.type = "unary",
            otel.kind = "client",
        );

        let provider = self.provider.clone();
        let codec = self.codec.clone();
        let method = self.method.clone();

        self.executor.spawn(
            async move {
                let result = call(&*provider, &*codec, &*method, &scope, request).await;
                scope.cancel();

                match &result {
                    Ok(_) => tracing::debug!("unary call succeeded"),
                    Err(e) => tracing::debug!(error = %e, "unary call failed"),
                }
                pending.deliver(result);
            }
            .instrument(span),
        );
    }
}

/// One unary session. The connection is released before this returns.
async fn call<P, C, M>(
    provider: &P,
    codec: &C,
    method: &M,
    scope: &CancelScope,
    request: Bytes,
) -> Result<Bytes, Error>
where
    P: ConnectionProvider,
    M: UnaryMethod<Client = P::Client>,
    C: MessageCodec<Request = M::Request, Response = M::Response>,
{
    let request = codec.decode(&request)?;

    let mut conn = scope
        .run(provider.acquire())
        .await
        .ok_or_else(canceled)??;

    let response = scope.run(method.invoke(conn.client_mut(), request)).await;
    conn.release();

    let response = response.ok_or_else(canceled)??;
    codec.encode(&response)
}

/// Cancellation of a unary session, reported as a call failure.
fn canceled() -> Error {
    Error::invoke(Code::Canceled, "call canceled")
}
