//! Message codecs between opaque bytes and typed messages.
//!
//! A [`MessageCodec`] belongs to exactly one method: it decodes the host's
//! request bytes into the method's request type and encodes the method's
//! responses back into bytes for delivery. Two implementations are provided:
//! - [`ProtoCodec`]: protobuf via `prost`
//! - [`JsonCodec`]: JSON via `serde_json`

use std::fmt;
use std::marker::PhantomData;

use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};

use crate::Error;

/// Codec trait for one method's request and response payloads.
///
/// Implementations must be pure: no side effects and no internal retry.
/// Each inbound message is decoded exactly once and each outbound message is
/// encoded exactly once; a failure is terminal for that message.
///
/// # Example
///
/// ```ignore
/// use rpc_bridge_core::{Error, MessageCodec};
/// use bytes::Bytes;
///
/// struct Utf8Codec;
///
/// impl MessageCodec for Utf8Codec {
///     type Request = String;
///     type Response = String;
///
///     fn decode(&self, bytes: &[u8]) -> Result<String, Error> {
///         String::from_utf8(bytes.to_vec()).map_err(|e| Error::Decode(e.to_string()))
///     }
///
///     fn encode(&self, response: &String) -> Result<Bytes, Error> {
///         Ok(Bytes::copy_from_slice(response.as_bytes()))
///     }
/// }
/// ```
pub trait MessageCodec: Send + Sync + 'static {
    /// The typed request the host's bytes decode into.
    type Request: Send + 'static;

    /// The typed response that gets encoded for the host.
    type Response: Send + 'static;

    /// Decode request bytes.
    fn decode(&self, bytes: &[u8]) -> Result<Self::Request, Error>;

    /// Encode a response.
    fn encode(&self, response: &Self::Response) -> Result<Bytes, Error>;
}

/// Protobuf codec using `prost`.
pub struct ProtoCodec<Req, Res> {
    _marker: PhantomData<fn() -> (Req, Res)>,
}

impl<Req, Res> ProtoCodec<Req, Res> {
    /// Create a new protobuf codec.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<Req, Res> Default for ProtoCodec<Req, Res> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req, Res> Clone for ProtoCodec<Req, Res> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<Req, Res> fmt::Debug for ProtoCodec<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProtoCodec")
    }
}

impl<Req, Res> MessageCodec for ProtoCodec<Req, Res>
where
    Req: prost::Message + Default + Send + 'static,
    Res: prost::Message + Send + 'static,
{
    type Request = Req;
    type Response = Res;

    fn decode(&self, bytes: &[u8]) -> Result<Req, Error> {
        Req::decode(bytes).map_err(|e| Error::Decode(format!("protobuf decoding failed: {}", e)))
    }

    fn encode(&self, response: &Res) -> Result<Bytes, Error> {
        Ok(Bytes::from(response.encode_to_vec()))
    }
}

/// JSON codec using `serde_json`.
pub struct JsonCodec<Req, Res> {
    _marker: PhantomData<fn() -> (Req, Res)>,
}

impl<Req, Res> JsonCodec<Req, Res> {
    /// Create a new JSON codec.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<Req, Res> Default for JsonCodec<Req, Res> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req, Res> Clone for JsonCodec<Req, Res> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<Req, Res> fmt::Debug for JsonCodec<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JsonCodec")
    }
}

impl<Req, Res> MessageCodec for JsonCodec<Req, Res>
where
    Req: DeserializeOwned + Send + 'static,
    Res: Serialize + Send + 'static,
{
    type Request = Req;
    type Response = Res;

    fn decode(&self, bytes: &[u8]) -> Result<Req, Error> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::Decode(format!("JSON decoding failed: {}", e)))
    }

    fn encode(&self, response: &Res) -> Result<Bytes, Error> {
        serde_json::to_vec(response)
            .map(Bytes::from)
            .map_err(|e| Error::Encode(format!("JSON encoding failed: {}", e)))
    }
}
