//! Core types for rpc-bridge.
//!
//! This crate provides the types shared between the bridge runtime
//! (`rpc-bridge`) and anything that plugs into it from the outside, such as
//! generated per-method wiring or host bindings.
//!
//! ## Modules
//!
//! - `error`: Status codes and the bridge error taxonomy
//! - `codec`: Opaque-bytes to typed-message codecs

mod codec;
mod error;

pub use codec::*;
pub use error::*;
