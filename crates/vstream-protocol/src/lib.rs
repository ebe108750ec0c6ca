//! RESP (REdis Serialization Protocol) framing.
//!
//! This crate owns the wire format only: parsing a byte stream into
//! [`RespValue`]s and encoding them back out. It knows nothing about what a
//! command means.

mod wire;

pub use wire::{RespCodec, RespError, RespValue};
