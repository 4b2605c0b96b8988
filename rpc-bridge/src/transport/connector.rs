//! Connection provider dialing a [`MemoryListener`].

use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use http::Uri;
use hyper_util::rt::TokioIo;
use rpc_bridge_core::Error;
use tonic::client::Grpc;
use tonic::transport::Channel;
use tower::service_fn;

use super::listener::MemoryListener;
use crate::config::ChannelOptions;
use crate::connection::{Connection, ConnectionProvider};

/// A [`ConnectionProvider`] yielding gRPC clients over in-memory pipes.
///
/// Every [`acquire`](ConnectionProvider::acquire) dials the listener once and
/// runs an HTTP/2 channel over that single pipe. The channel never
/// reconnects: once the pipe closes, calls on it fail as unavailable.
/// Releasing the connection drops the channel, which closes the pipe.
#[derive(Clone, Debug)]
pub struct MemoryConnector {
    listener: MemoryListener,
    options: ChannelOptions,
}

impl MemoryConnector {
    /// Create a connector with default [`ChannelOptions`].
    pub fn new(listener: MemoryListener) -> Self {
        Self::with_options(listener, ChannelOptions::default())
    }

    /// Create a connector with the given options.
    pub fn with_options(listener: MemoryListener, options: ChannelOptions) -> Self {
        Self { listener, options }
    }

    /// Get the channel options.
    pub fn options(&self) -> &ChannelOptions {
        &self.options
    }

    async fn channel(&self) -> Result<Channel, Error> {
        let pipe = self.listener.dial(self.options.get_buffer_size())?;
        let slot = Arc::new(Mutex::new(Some(pipe)));

        let connector = service_fn(move |_: Uri| {
            let pipe = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
            async move {
                pipe.map(TokioIo::new)
                    .ok_or_else(|| io::Error::other("in-memory pipe was already used"))
            }
        });

        self.options
            .endpoint()?
            .connect_with_connector(connector)
            .await
            .map_err(|e| Error::Connect(format!("failed to connect: {e}")))
    }
}

impl ConnectionProvider for MemoryConnector {
    type Client = Grpc<Channel>;

    async fn acquire(&self) -> Result<Connection<Grpc<Channel>>, Error> {
        let channel = self.channel().await?;
        tracing::debug!("in-memory connection acquired");

        Ok(Connection::new(Grpc::new(channel), || {
            tracing::debug!("in-memory connection released");
        }))
    }
}
