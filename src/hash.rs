//! Key hashing seam.
//!
//! The engine never hashes keys directly; it goes through the [`KeyHasher`]
//! trait so that the function can be swapped in tests (e.g. a constant hash
//! to force index collisions). The hash is an **index shortcut only**:
//! collisions are legal and resolved by byte-equal key comparison on read.
//!
//! # Stability contract
//!
//! The hash of a key is persisted in every block header and used to rebuild
//! the key index on open. Changing the hash function for an existing data
//! file invalidates that index, so the default must stay fixed for the life
//! of any persisted file.

/// Computes a 32-bit content hash of key bytes.
///
/// Implementations must be pure: the same input always yields the same
/// output, across runs and processes.
pub trait KeyHasher {
    /// Hash the given key bytes.
    fn hash_key(&self, key: &[u8]) -> u32;
}

/// The default hasher: CRC32 over the key bytes via `crc32fast`.
///
/// 32 bits for mostly human-readable keys is plenty; CRC32 is fast and
/// its polynomial never changes underneath us.
#[derive(Debug, Default, Clone, Copy)]
pub struct Crc32Hasher;

impl KeyHasher for Crc32Hasher {
    #[inline]
    fn hash_key(&self, key: &[u8]) -> u32 {
        crc32fast::hash(key)
    }
}

// ------------------------------------------------------------------------------------------------
// Unit tests
// ------------------------------------------------------------------------------------------------
