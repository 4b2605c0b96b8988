//! Transport options for in-memory gRPC connections.

use std::time::Duration;

use rpc_bridge_core::Error;
use tonic::transport::Endpoint;

/// Default capacity of each direction of an in-memory connection, in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Default number of bidi requests queued before `send` waits.
pub const DEFAULT_STREAM_BUFFER: usize = 16;

/// Authority used for the in-memory endpoint. Never resolved.
const IN_MEMORY_URI: &str = "http://in-memory.invalid";

/// Options for channels built by
/// [`MemoryConnector`](crate::transport::MemoryConnector).
///
/// # Example
///
/// ```ignore
/// let options = ChannelOptions::new()
///     .buffer_size(256 * 1024)
///     .request_timeout(Duration::from_secs(30))
///     .stream_buffer(64);
/// ```
#[derive(Clone, Debug)]
pub struct ChannelOptions {
    buffer_size: usize,
    connect_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    http2_keep_alive_interval: Option<Duration>,
    stream_buffer: usize,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelOptions {
    /// Create options with default settings and no timeouts.
    pub fn new() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            connect_timeout: None,
            request_timeout: None,
            http2_keep_alive_interval: None,
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }

    /// Set the capacity of each direction of the in-memory connection.
    pub fn buffer_size(mut self, bytes: usize) -> Self {
        self.buffer_size = bytes.max(1);
        self
    }

    /// Set the timeout for establishing the HTTP/2 connection.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the timeout applied to every request.
    ///
    /// Expiry surfaces as an ordinary invoke or stream failure.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set the HTTP/2 keep-alive ping interval.
    pub fn http2_keep_alive_interval(mut self, interval: Duration) -> Self {
        self.http2_keep_alive_interval = Some(interval);
        self
    }

    /// Set how many bidi requests may be queued before `send` waits.
    pub fn stream_buffer(mut self, depth: usize) -> Self {
        self.stream_buffer = depth.max(1);
        self
    }

    /// Get the connection buffer size.
    pub fn get_buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Get the bidi request queue depth.
    pub fn get_stream_buffer(&self) -> usize {
        self.stream_buffer
    }

    /// Build the endpoint a channel is created from.
    pub(crate) fn endpoint(&self) -> Result<Endpoint, Error> {
        let mut endpoint = Endpoint::try_from(IN_MEMORY_URI)
            .map_err(|e| Error::Connect(format!("invalid endpoint: {e}")))?;

        if let Some(timeout) = self.connect_timeout {
            endpoint = endpoint.connect_timeout(timeout);
        }
        if let Some(timeout) = self.request_timeout {
            endpoint = endpoint.timeout(timeout);
        }
        if let Some(interval) = self.http2_keep_alive_interval {
            endpoint = endpoint.http2_keep_alive_interval(interval);
        }
        Ok(endpoint)
    }
}
