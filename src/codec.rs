//! Value serialization seam.
//!
//! The engine stores opaque byte payloads; how a typed record becomes
//! bytes is the caller's concern, expressed through [`ValueCodec`]. Two
//! implementations ship with the crate:
//!
//! - [`BinaryCodec`]: for any type implementing the crate's
//!   [`Encode`]/[`Decode`] traits.
//! - [`RawCodec`]: passes `Vec<u8>` values through untouched.
//!
//! A codec failure never corrupts store state: serialization runs before
//! any id is minted or any byte is buffered, and deserialization failures
//! surface as errors on the read path only.

use std::marker::PhantomData;

use crate::encoding::{self, Decode, Encode};
use thiserror::Error;

/// Errors raised by a value codec.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The value could not be serialized.
    #[error("serialize error: {0}")]
    Serialize(String),

    /// The stored bytes could not be deserialized.
    #[error("deserialize error: {0}")]
    Deserialize(String),
}

/// Converts between a caller's value type and its on-disk byte payload.
///
/// Implementations must round-trip: `deserialize(serialize(v)) == v` for
/// every value the caller stores. The engine treats the bytes as opaque.
pub trait ValueCodec {
    /// The in-memory record type.
    type Value;

    /// Encodes a value into its byte payload.
    fn serialize(&self, value: &Self::Value) -> Result<Vec<u8>, CodecError>;

    /// Decodes a value from its byte payload.
    fn deserialize(&self, bytes: &[u8]) -> Result<Self::Value, CodecError>;
}

// ------------------------------------------------------------------------------------------------
// BinaryCodec
// ------------------------------------------------------------------------------------------------

/// Codec for record types implementing [`Encode`] and [`Decode`].
pub struct BinaryCodec<T> {
    _marker: PhantomData<T>,
}

impl<T> Default for BinaryCodec<T> {
    fn default() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T: Encode + Decode> ValueCodec for BinaryCodec<T> {
    type Value = T;

    fn serialize(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        encoding::encode_to_vec(value).map_err(|e| CodecError::Serialize(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<T, CodecError> {
        let (value, consumed) =
            encoding::decode_from_slice::<T>(bytes).map_err(|e| CodecError::Deserialize(e.to_string()))?;
        if consumed != bytes.len() {
            return Err(CodecError::Deserialize(format!(
                "trailing bytes: decoded {consumed} of {} payload bytes",
                bytes.len()
            )));
        }
        Ok(value)
    }
}

// ------------------------------------------------------------------------------------------------
// RawCodec
// ------------------------------------------------------------------------------------------------

/// Identity codec: values are already bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawCodec;

impl ValueCodec for RawCodec {
    type Value = Vec<u8>;

    fn serialize(&self, value: &Vec<u8>) -> Result<Vec<u8>, CodecError> {
        Ok(value.clone())
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(bytes.to_vec())
    }
}
