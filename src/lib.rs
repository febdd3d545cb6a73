//! # TabulaDB
//!
//! An embedded, single-file, append-only key/value store.
//!
//! Every record lives in one data file as a length-prefixed block; deletes
//! are in-memory tombstones that get physically dropped when the store is
//! closed. Reads are served through an LRU cache, writes are coalesced in a
//! buffer and appended in batches. All indexing state is rebuilt from the
//! file on open, so the file is the only artifact that has to survive.
//!
//! ## Quick start
//!
//! ```no_run
//! use tabuladb::{RawCodec, Store, StoreConfig};
//!
//! fn main() -> Result<(), tabuladb::StoreError> {
//!     let store = Store::open(".", "animals", StoreConfig::default(), RawCodec)?;
//!
//!     store.append(b"capybara", &b"largest living rodent".to_vec())?;
//!     let value = store.get(b"capybara")?;
//!     assert_eq!(value, b"largest living rodent");
//!
//!     store.update(b"capybara", &b"semi-aquatic, very calm".to_vec())?;
//!     store.delete(b"capybara")?;
//!
//!     store.close()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Typed records
//!
//! Implement [`Encode`] and [`Decode`] for a record type and open the store
//! with a [`BinaryCodec`], and the store API works in terms of that type
//! instead of raw bytes. The [`ValueCodec`] trait is the seam: any
//! serialization scheme can be plugged in.
//!
//! ## What this is not
//!
//! Not a multi-file database, not crash-durable for buffered writes, and
//! not multi-process safe. One process, one handle (freely clone-able and
//! shareable across threads), one file.

#![allow(dead_code)]

mod block;
mod cache;
mod codec;
mod encoding;
mod engine;
mod hash;
mod wbuffer;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::warn;

pub use crate::codec::{BinaryCodec, CodecError, RawCodec, ValueCodec};
pub use crate::encoding::{Decode, Encode, EncodingError};
pub use crate::engine::{DEFAULT_CACHE_CAPACITY, DEFAULT_FLUSH_THRESHOLD, EngineError};
pub use crate::hash::{Crc32Hasher, KeyHasher};

use crate::engine::{Engine, EngineConfig};

// ------------------------------------------------------------------------------------------------
// Error type
// ------------------------------------------------------------------------------------------------

/// Errors surfaced by the public [`Store`] handle.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The handle was closed by an earlier `close` or `destroy` call.
    #[error("store handle is closed")]
    Closed,

    /// The supplied [`StoreConfig`] is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An error from the storage engine.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

// ------------------------------------------------------------------------------------------------
// Configuration
// ------------------------------------------------------------------------------------------------

/// Tuning knobs for a [`Store`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Read-cache capacity in entries. Must be at least 1.
    pub cache_capacity: u32,

    /// Write-buffer byte size above which appends are flushed to the file
    /// mid-session.
    pub flush_threshold: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
        }
    }
}

impl StoreConfig {
    fn validate(&self) -> Result<(), StoreError> {
        if self.cache_capacity == 0 {
            return Err(StoreError::InvalidConfig(
                "cache_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            cache_capacity: self.cache_capacity,
            flush_threshold: self.flush_threshold,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Store handle
// ------------------------------------------------------------------------------------------------

/// The public store handle.
///
/// Thin wrapper around the engine that tracks the closed state: once
/// [`close`](Store::close) or [`destroy`](Store::destroy) has run, every
/// operation reports [`StoreError::Closed`]. Dropping an open handle
/// closes it best-effort.
pub struct Store<C: ValueCodec> {
    engine: Engine<C>,
    closed: AtomicBool,
}

impl<C: ValueCodec> Store<C>
where
    C::Value: Clone,
{
    /// Opens (or creates) the store named `name` under `<root>/db/`,
    /// hashing keys with CRC32.
    pub fn open(
        root: impl AsRef<Path>,
        name: &str,
        config: StoreConfig,
        codec: C,
    ) -> Result<Self, StoreError> {
        Self::open_with_hasher(root, name, config, codec, Box::new(Crc32Hasher))
    }

    /// Opens the store with a caller-supplied key hasher.
    ///
    /// The hasher must stay the same across sessions: the load scan
    /// re-hashes every key in the file and refuses to open on a mismatch.
    pub fn open_with_hasher(
        root: impl AsRef<Path>,
        name: &str,
        config: StoreConfig,
        codec: C,
        hasher: Box<dyn KeyHasher + Send>,
    ) -> Result<Self, StoreError> {
        config.validate()?;
        let engine = Engine::open(root, name, config.to_engine_config(), codec, hasher)?;
        Ok(Self {
            engine,
            closed: AtomicBool::new(false),
        })
    }

    fn check_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    /// Appends a new record and returns its id.
    ///
    /// Appending an existing key does not replace it; use
    /// [`update`](Store::update) for that.
    pub fn append(&self, key: &[u8], value: &C::Value) -> Result<u32, StoreError> {
        self.check_open()?;
        Ok(self.engine.append(key, value)?)
    }

    /// Retrieves the value stored under a byte-equal key.
    pub fn get(&self, key: &[u8]) -> Result<C::Value, StoreError> {
        self.check_open()?;
        Ok(self.engine.get(key)?)
    }

    /// Replaces the value under `key`, returning the record's new id.
    pub fn update(&self, key: &[u8], value: &C::Value) -> Result<u32, StoreError> {
        self.check_open()?;
        Ok(self.engine.update(key, value)?)
    }

    /// Deletes the record under `key`.
    pub fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.check_open()?;
        Ok(self.engine.delete(key)?)
    }

    /// Deletes a record by the id that [`append`](Store::append) or
    /// [`update`](Store::update) returned.
    ///
    /// Unlike the key-based path this distinguishes a repeated delete
    /// ([`EngineError::AlreadyDeleted`]) from an id that never existed
    /// ([`EngineError::NotFound`]).
    pub fn delete_by_id(&self, id: u32) -> Result<(), StoreError> {
        self.check_open()?;
        Ok(self.engine.delete_by_id(id)?)
    }

    /// Number of live records.
    pub fn item_count(&self) -> Result<u64, StoreError> {
        self.check_open()?;
        Ok(self.engine.item_count()?)
    }

    /// Read-cache hit rate as a percentage in `[0, 100]`.
    pub fn hit_rate(&self) -> Result<f64, StoreError> {
        self.check_open()?;
        Ok(self.engine.hit_rate()?)
    }

    /// Flushes, compacts away deleted records, and closes the file.
    ///
    /// Idempotent: a second call is a no-op.
    pub fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        Ok(self.engine.close()?)
    }

    /// Closes the store and removes its data file.
    pub fn destroy(self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::Release);
        Ok(self.engine.destroy()?)
    }
}

impl<C: ValueCodec> Drop for Store<C> {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::AcqRel)
            && let Err(e) = self.engine.close()
        {
            warn!(error = %e, "failed to close store on drop");
        }
    }
}
