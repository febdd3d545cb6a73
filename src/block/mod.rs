//! On-disk block codec.
//!
//! A **block** is the single unit of persistence: one appended record,
//! written contiguously with no padding. The data file is nothing but a
//! concatenation of well-formed blocks.
//!
//! # On-disk layout
//!
//! ```text
//! length      : u32   total bytes of this block, header included
//! id          : u32   unique per file, monotonically assigned
//! key_hash    : u32   content hash of the key bytes
//! key_length  : u32
//! value_length: u32
//! key_bytes   : key_length * u8
//! value_bytes : value_length * u8
//! ```
//!
//! All integers are **little-endian**. The header is a fixed
//! [`BLOCK_HEADER_SIZE`]-byte prefix, so for any well-formed block
//! `length == BLOCK_HEADER_SIZE + key_length + value_length`.
//!
//! The codec is stateless and allocation-light: one output buffer per
//! encode, two borrowed slices per decode. Values are opaque bytes here;
//! serialization is the caller's concern (see [`crate::codec`]).


use std::io::{self, Read};

use crate::encoding::{self, Decode, Encode, EncodingError};
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// Constants
// ------------------------------------------------------------------------------------------------

/// Fixed byte size of the block header prefix (five `u32` fields).
pub const BLOCK_HEADER_SIZE: usize = 20;

/// Maximum total encoded size of a block, header and payloads included.
///
/// The `length` field is a `u32`, so a block can never exceed 4 GiB − 1.
pub const MAX_BLOCK_SIZE: u64 = u32::MAX as u64;

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors returned by block encode/decode operations.
#[derive(Debug, Error)]
pub enum BlockError {
    /// The encoded block would exceed [`MAX_BLOCK_SIZE`].
    #[error("payload too large: encoded block would be {size} bytes (max {MAX_BLOCK_SIZE})")]
    PayloadTooLarge {
        /// Total size the block would have required.
        size: u64,
    },

    /// The reader ended before a full header or body could be read.
    #[error("short read: {0}")]
    ShortRead(io::Error),

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Header fields are inconsistent with each other or with the buffer.
    #[error("malformed block: {0}")]
    Malformed(String),

    /// Wire-level encoding failure.
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),
}

// ------------------------------------------------------------------------------------------------
// Block header
// ------------------------------------------------------------------------------------------------

/// Fixed-width header at the start of every block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Total encoded length of the block in bytes, header included.
    pub length: u32,

    /// Unique record id, monotonically assigned at append time.
    pub id: u32,

    /// Content hash of the key bytes (index shortcut, re-verified on load).
    pub key_hash: u32,

    /// Length of the key in bytes.
    pub key_length: u32,

    /// Length of the value payload in bytes (may be zero).
    pub value_length: u32,
}

impl Encode for BlockHeader {
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), EncodingError> {
        self.length.encode_to(buf)?;
        self.id.encode_to(buf)?;
        self.key_hash.encode_to(buf)?;
        self.key_length.encode_to(buf)?;
        self.value_length.encode_to(buf)?;
        Ok(())
    }
}

impl Decode for BlockHeader {
    fn decode_from(buf: &[u8]) -> Result<(Self, usize), EncodingError> {
        let mut off = 0;
        let (length, n) = u32::decode_from(&buf[off..])?;
        off += n;
        let (id, n) = u32::decode_from(&buf[off..])?;
        off += n;
        let (key_hash, n) = u32::decode_from(&buf[off..])?;
        off += n;
        let (key_length, n) = u32::decode_from(&buf[off..])?;
        off += n;
        let (value_length, n) = u32::decode_from(&buf[off..])?;
        off += n;
        Ok((
            Self {
                length,
                id,
                key_hash,
                key_length,
                value_length,
            },
            off,
        ))
    }
}

impl BlockHeader {
    /// Decodes a header from the first [`BLOCK_HEADER_SIZE`] bytes of `buf`
    /// and sanity-checks its internal consistency.
    pub fn decode(buf: &[u8]) -> Result<Self, BlockError> {
        let (header, _) = encoding::decode_from_slice::<BlockHeader>(buf)?;
        header.validate()?;
        Ok(header)
    }

    /// Reads exactly [`BLOCK_HEADER_SIZE`] bytes from `reader` and decodes
    /// them.
    ///
    /// An EOF hit mid-header surfaces as [`BlockError::ShortRead`].
    pub fn read_from(reader: &mut impl Read) -> Result<Self, BlockError> {
        let mut buf = [0u8; BLOCK_HEADER_SIZE];
        reader.read_exact(&mut buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                BlockError::ShortRead(e)
            } else {
                BlockError::Io(e)
            }
        })?;
        Self::decode(&buf)
    }

    /// Number of bytes following the header (key plus value).
    pub fn body_len(&self) -> usize {
        self.key_length as usize + self.value_length as usize
    }

    /// Verifies that `length` agrees with the key and value lengths.
    fn validate(&self) -> Result<(), BlockError> {
        let expected = BLOCK_HEADER_SIZE as u64 + self.key_length as u64 + self.value_length as u64;
        if u64::from(self.length) != expected {
            return Err(BlockError::Malformed(format!(
                "length field {} does not match header + key ({}) + value ({})",
                self.length, self.key_length, self.value_length
            )));
        }
        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// Encode / decode
// ------------------------------------------------------------------------------------------------

/// Computes the total encoded length of a block with the given key and
/// value sizes.
///
/// This is the pre-write check for the 4 GiB ceiling: it fails with
/// [`BlockError::PayloadTooLarge`] before any bytes are produced.
pub fn encoded_len(key_len: usize, value_len: usize) -> Result<u32, BlockError> {
    let total = BLOCK_HEADER_SIZE as u64 + key_len as u64 + value_len as u64;
    if total > MAX_BLOCK_SIZE {
        return Err(BlockError::PayloadTooLarge { size: total });
    }
    Ok(total as u32)
}

/// Encodes one block: header ∥ key ∥ value in a single output buffer.
pub fn encode_block(
    id: u32,
    key_hash: u32,
    key: &[u8],
    value: &[u8],
) -> Result<Vec<u8>, BlockError> {
    let length = encoded_len(key.len(), value.len())?;
    let header = BlockHeader {
        length,
        id,
        key_hash,
        // encoded_len bounds both lengths below u32::MAX
        key_length: key.len() as u32,
        value_length: value.len() as u32,
    };

    let mut buf = Vec::with_capacity(length as usize);
    header.encode_to(&mut buf)?;
    buf.extend_from_slice(key);
    buf.extend_from_slice(value);
    Ok(buf)
}

/// Decodes a full block buffer into its header, key slice, and value slice.
///
/// `buf` must hold exactly one block; trailing bytes are a
/// [`BlockError::Malformed`] error, as is a buffer shorter than the
/// header's `length` field.
pub fn decode_block(buf: &[u8]) -> Result<(BlockHeader, &[u8], &[u8]), BlockError> {
    if buf.len() < BLOCK_HEADER_SIZE {
        return Err(BlockError::Malformed(format!(
            "buffer of {} bytes is shorter than the {BLOCK_HEADER_SIZE}-byte header",
            buf.len()
        )));
    }
    let header = BlockHeader::decode(&buf[..BLOCK_HEADER_SIZE])?;
    if buf.len() != header.length as usize {
        return Err(BlockError::Malformed(format!(
            "buffer of {} bytes does not match header length {}",
            buf.len(),
            header.length
        )));
    }

    let key_end = BLOCK_HEADER_SIZE + header.key_length as usize;
    let key = &buf[BLOCK_HEADER_SIZE..key_end];
    let value = &buf[key_end..key_end + header.value_length as usize];
    Ok((header, key, value))
}
