//! # Append-only storage engine
//!
//! The engine owns exactly one data file and the in-memory structures
//! needed to serve reads from it:
//!
//! 1. **Offsets**: id to absolute byte offset of the record's block.
//! 2. **Key index**: key hash to ordered list of candidate ids; collisions
//!    are legal and resolved by byte-equal key comparison on read.
//! 3. **Tombstones**: ids logically deleted but still physically present
//!    until close-time compaction.
//! 4. **LRU read cache** and **write buffer**: decoded records on the read
//!    side, encoded blocks on the write side.
//!
//! ## Data flow
//!
//! An append serializes the value, encodes a block, mirrors the decoded
//! record into the read cache, and parks the block in the write buffer.
//! Once the buffer outgrows the flush threshold, it is written to the file
//! in one batch and the resulting absolute offsets are recorded. A read
//! checks the cache first, then the buffer (forcing a flush), then the
//! file. A delete is an in-memory tombstone, and `close` rewrites the
//! file without tombstoned blocks.
//!
//! ## Concurrency model
//!
//! One exclusive lock per handle: every operation locks the single
//! `Arc<Mutex<EngineInner>>` for its full duration, making operations
//! linearisable in call order. The only suspension points are blocking
//! file I/O.
//!
//! ## Durability
//!
//! Records still in the write buffer at crash time are lost. A cleanly
//! written file is fully recoverable: `open` rebuilds all
//! indices from a single sequential scan, re-verifying each block's key
//! hash along the way.

#[cfg(test)]
mod tests;

use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use memmap2::Mmap;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::block::{self, BLOCK_HEADER_SIZE, BlockError, BlockHeader};
use crate::cache::{CacheEntry, LruCache};
use crate::codec::{CodecError, ValueCodec};
use crate::hash::KeyHasher;
use crate::wbuffer::WriteBuffer;

// ------------------------------------------------------------------------------------------------
// Constants
// ------------------------------------------------------------------------------------------------

/// Sub-directory (under the root passed to [`Engine::open`]) that holds all
/// store files.
pub const DB_DIR: &str = "db";

/// Extension of store data files.
pub const DB_EXT: &str = "sdb";

/// Transient file used by close-time compaction.
pub const TEMP_FILE: &str = "temp.sdb";

/// Write-buffer byte size above which a mid-session flush is triggered.
pub const DEFAULT_FLUSH_THRESHOLD: u64 = 16 * 1024;

/// Default read-cache capacity in entries.
pub const DEFAULT_CACHE_CAPACITY: u32 = 100;

// ------------------------------------------------------------------------------------------------
// Error Types
// ------------------------------------------------------------------------------------------------

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Key or id absent (or tombstoned).
    #[error("record not found")]
    NotFound,

    /// Delete targeting an already-tombstoned id.
    #[error("record already deleted")]
    AlreadyDeleted,

    /// Block encode/decode failure, including the 4 GiB payload ceiling.
    #[error("block error: {0}")]
    Block(#[from] BlockError),

    /// Caller codec failure (serialize or deserialize).
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Underlying filesystem I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The load scan detected a malformed header or truncated block.
    #[error("corrupt data file: {0}")]
    CorruptFile(String),

    /// A previous failed write left the store in an unknown on-disk state.
    #[error("store marked corrupted after a failed write")]
    Corrupted,

    /// Internal invariant violation (poisoned lock, unexpected state, etc.).
    #[error("internal error: {0}")]
    Internal(String),
}

// ------------------------------------------------------------------------------------------------
// Configuration
// ------------------------------------------------------------------------------------------------

/// Configuration for an [`Engine`] instance.
pub struct EngineConfig {
    /// Read-cache capacity in entries. Must be ≥ 1.
    pub cache_capacity: u32,

    /// Write-buffer byte size that triggers a mid-session flush.
    pub flush_threshold: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Engine state
// ------------------------------------------------------------------------------------------------

struct EngineInner<C: ValueCodec> {
    /// Absolute path of the data file.
    path: PathBuf,

    /// Sibling temp file used by compaction.
    temp_path: PathBuf,

    /// Open data file handle; `None` once the engine is closed or destroyed.
    file: Option<File>,

    /// Caller-supplied value codec.
    codec: C,

    /// Key hash function; fixed for the life of the data file.
    hasher: Box<dyn KeyHasher + Send>,

    /// LRU cache of decoded records.
    cache: LruCache<C::Value>,

    /// Pending encoded blocks awaiting a batched append.
    buffer: WriteBuffer,

    /// id → absolute byte offset of the block in the file.
    offsets: HashMap<u32, u64>,

    /// key hash → ordered candidate ids sharing that hash.
    key_index: HashMap<u32, Vec<u32>>,

    /// Ids marked deleted but still physically present in the file.
    tombstones: HashSet<u32>,

    /// Next id to assign; kept as u64 so exhaustion of the 32-bit id
    /// space is detectable.
    next_id: u64,

    /// Count of live (non-tombstoned) records.
    item_count: u64,

    /// Offset at which the next flushed block lands (end of file).
    current_offset: u64,

    /// Flush trigger in bytes.
    flush_threshold: u64,

    /// Set after a failed flush; all subsequent operations are refused.
    corrupted: bool,
}

/// The storage engine handle.
///
/// Clone-able; all clones share state through an `Arc<Mutex<_>>`, and every
/// operation holds that single lock for its full duration.
pub struct Engine<C: ValueCodec> {
    inner: Arc<Mutex<EngineInner<C>>>,
}

impl<C: ValueCodec> Clone for Engine<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: ValueCodec> Engine<C> {
    // --------------------------------------------------------------------------------------------
    // Lock helper
    // --------------------------------------------------------------------------------------------

    /// Acquires the handle lock, converting poisoning into an internal error.
    fn lock(&self) -> Result<MutexGuard<'_, EngineInner<C>>, EngineError> {
        self.inner
            .lock()
            .map_err(|_| EngineError::Internal("handle lock poisoned".into()))
    }

    // --------------------------------------------------------------------------------------------
    // Lifecycle
    // --------------------------------------------------------------------------------------------

    /// Opens (or creates) the store named `name` under `<root>/db/`.
    ///
    /// A non-empty existing file is scanned front to back to rebuild the
    /// offset and key indices; each block's key hash is recomputed and
    /// verified during the scan. A stale compaction temp file left by an
    /// interrupted close is removed.
    pub fn open(
        root: impl AsRef<Path>,
        name: &str,
        config: EngineConfig,
        codec: C,
        hasher: Box<dyn KeyHasher + Send>,
    ) -> Result<Self, EngineError> {
        debug_assert!(config.cache_capacity >= 1, "validated by the public handle");

        let dir = root.as_ref().join(DB_DIR);
        create_store_dir(&dir)?;

        let temp_path = dir.join(TEMP_FILE);
        if temp_path.exists() {
            warn!(path = %temp_path.display(), "removing stale compaction temp file");
            fs::remove_file(&temp_path)?;
        }

        let path = dir.join(format!("{name}.{DB_EXT}"));
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;
        let file_len = file.metadata()?.len();

        let mut inner = EngineInner {
            path: path.clone(),
            temp_path,
            file: Some(file),
            codec,
            hasher,
            cache: LruCache::new(config.cache_capacity as usize),
            buffer: WriteBuffer::new(),
            offsets: HashMap::new(),
            key_index: HashMap::new(),
            tombstones: HashSet::new(),
            next_id: 0,
            item_count: 0,
            current_offset: 0,
            flush_threshold: config.flush_threshold,
            corrupted: false,
        };

        if file_len > 0 {
            inner.load_scan()?;
        }

        info!(
            path = %path.display(),
            records = inner.item_count,
            "store opened"
        );

        Ok(Self {
            inner: Arc::new(Mutex::new(inner)),
        })
    }

    /// Flushes pending writes, closes the file, and, if any record was
    /// deleted this session, compacts the file by rewriting it without
    /// tombstoned blocks.
    ///
    /// The handle is unusable afterwards.
    pub fn close(&self) -> Result<(), EngineError> {
        let mut inner = self.lock()?;
        if inner.file.is_none() {
            return Ok(()); // already closed
        }

        inner.flush_buffer()?;
        inner.file = None; // drop the handle before rewriting the file

        if inner.tombstones.is_empty() {
            info!("store closed, no compaction needed");
        } else {
            inner.compact()?;
        }
        inner.invalidate();
        Ok(())
    }

    /// Closes the store and removes its data file.
    pub fn destroy(&self) -> Result<(), EngineError> {
        let mut inner = self.lock()?;
        inner.file = None;

        if inner.temp_path.exists() {
            fs::remove_file(&inner.temp_path)?;
        }
        match fs::remove_file(&inner.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        info!(path = %inner.path.display(), "store destroyed");
        inner.invalidate();
        Ok(())
    }

    // --------------------------------------------------------------------------------------------
    // Statistics and test plumbing
    // --------------------------------------------------------------------------------------------

    /// Read-cache hit rate as a percentage in `[0, 100]`.
    pub fn hit_rate(&self) -> Result<f64, EngineError> {
        Ok(self.lock()?.cache.hit_rate())
    }

    /// Number of live (non-tombstoned) records.
    pub fn item_count(&self) -> Result<u64, EngineError> {
        Ok(self.lock()?.item_count)
    }

    /// Forces a write-buffer flush; a no-op when the buffer is empty.
    pub(crate) fn flush(&self) -> Result<(), EngineError> {
        let mut inner = self.lock()?;
        inner.ensure_usable()?;
        inner.flush_buffer()
    }

    /// Zeroes the cache request/hit counters.
    pub(crate) fn reset_cache_stats(&self) -> Result<(), EngineError> {
        self.lock()?.cache.reset_stats();
        Ok(())
    }
}

impl<C: ValueCodec> Engine<C>
where
    C::Value: Clone,
{
    // --------------------------------------------------------------------------------------------
    // Write operations
    // --------------------------------------------------------------------------------------------

    /// Appends a new record, returning its freshly minted id.
    ///
    /// The value is serialized before any state changes, so a codec
    /// failure leaves the store untouched.
    pub fn append(&self, key: &[u8], value: &C::Value) -> Result<u32, EngineError> {
        let mut inner = self.lock()?;
        inner.ensure_usable()?;
        inner.append_record(key, value)
    }

    /// Replaces the value stored under `key`: the old record is
    /// tombstoned and a new record with a fresh id is appended.
    ///
    /// Returns the new id, or [`EngineError::NotFound`] if no live record
    /// has a byte-equal key.
    pub fn update(&self, key: &[u8], value: &C::Value) -> Result<u32, EngineError> {
        let mut inner = self.lock()?;
        inner.ensure_usable()?;

        let hash = inner.hasher.hash_key(key);
        let id = inner.find_live(key, hash)?.ok_or(EngineError::NotFound)?;
        inner.tombstone(id, hash);
        let new_id = inner.append_record(key, value)?;
        trace!(old_id = id, new_id, key = %HexKey(key), "record updated");
        Ok(new_id)
    }

    /// Deletes the record stored under `key` (in-memory tombstone; the
    /// block stays on disk until compaction).
    pub fn delete(&self, key: &[u8]) -> Result<(), EngineError> {
        let mut inner = self.lock()?;
        inner.ensure_usable()?;

        let hash = inner.hasher.hash_key(key);
        let id = inner.find_live(key, hash)?.ok_or(EngineError::NotFound)?;
        inner.tombstone(id, hash);
        trace!(id, key = %HexKey(key), "record deleted");
        Ok(())
    }

    /// Deletes a record by id.
    ///
    /// Unlike the key-based path this distinguishes a double delete
    /// ([`EngineError::AlreadyDeleted`]) from an id that never existed
    /// ([`EngineError::NotFound`]).
    pub(crate) fn delete_by_id(&self, id: u32) -> Result<(), EngineError> {
        let mut inner = self.lock()?;
        inner.ensure_usable()?;

        if inner.tombstones.contains(&id) {
            return Err(EngineError::AlreadyDeleted);
        }
        if !inner.offsets.contains_key(&id) && !inner.buffer.contains(id) {
            return Err(EngineError::NotFound);
        }

        let hash = inner.key_hash_of(id)?;
        inner.tombstone(id, hash);
        trace!(id, "record deleted by id");
        Ok(())
    }

    // --------------------------------------------------------------------------------------------
    // Read operations
    // --------------------------------------------------------------------------------------------

    /// Retrieves the value stored under `key`.
    ///
    /// Hash collisions are tolerated: every candidate id sharing the key's
    /// hash is resolved and its key byte-compared; only an exact match is
    /// returned.
    pub fn get(&self, key: &[u8]) -> Result<C::Value, EngineError> {
        let mut inner = self.lock()?;
        inner.ensure_usable()?;

        let hash = inner.hasher.hash_key(key);
        let candidates = match inner.key_index.get(&hash) {
            Some(ids) => ids.clone(),
            None => return Err(EngineError::NotFound),
        };

        for id in candidates {
            match inner.get_by_id(id) {
                Ok((record_key, value)) if record_key == key => return Ok(value),
                Ok(_) => continue,                       // hash collision
                Err(EngineError::NotFound) => continue,  // stale candidate
                Err(e) => return Err(e),
            }
        }
        Err(EngineError::NotFound)
    }

    /// Retrieves a record by id: `(key bytes, value)`.
    pub(crate) fn get_by_id(&self, id: u32) -> Result<(Vec<u8>, C::Value), EngineError> {
        let mut inner = self.lock()?;
        inner.ensure_usable()?;
        inner.get_by_id(id)
    }
}

// ------------------------------------------------------------------------------------------------
// EngineInner: everything below runs under the handle lock
// ------------------------------------------------------------------------------------------------

impl<C: ValueCodec> EngineInner<C> {
    /// Refuses operations on a closed or corrupted store.
    fn ensure_usable(&self) -> Result<(), EngineError> {
        if self.corrupted {
            return Err(EngineError::Corrupted);
        }
        if self.file.is_none() {
            return Err(EngineError::Internal("store handle is closed".into()));
        }
        Ok(())
    }

    /// Mints the next record id, refusing to wrap the 32-bit id space.
    fn mint_id(&mut self) -> Result<u32, EngineError> {
        if self.next_id > u64::from(u32::MAX) {
            return Err(EngineError::Internal("id space exhausted".into()));
        }
        let id = self.next_id as u32;
        self.next_id += 1;
        Ok(id)
    }

    /// Reads one full block at an absolute file offset.
    fn read_block_at(&mut self, pos: u64) -> Result<(BlockHeader, Vec<u8>, Vec<u8>), EngineError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| EngineError::Internal("store handle is closed".into()))?;

        file.seek(SeekFrom::Start(pos))?;
        let header = BlockHeader::read_from(file)?;

        let mut body = vec![0u8; header.body_len()];
        file.read_exact(&mut body)?;

        let value = body.split_off(header.key_length as usize);
        Ok((header, body, value))
    }

    /// Looks up the key hash of a live id without decoding its value.
    ///
    /// Uses a counter-free cache peek: this is bookkeeping for a delete,
    /// not a client read, so it must not move the hit-rate statistic.
    fn key_hash_of(&mut self, id: u32) -> Result<u32, EngineError> {
        if let Some(entry) = self.cache.peek(id) {
            return Ok(entry.key_hash);
        }
        if self.buffer.contains(id) {
            self.flush_buffer()?;
        }
        let pos = *self.offsets.get(&id).ok_or(EngineError::NotFound)?;
        let (header, _, _) = self.read_block_at(pos)?;
        Ok(header.key_hash)
    }
}

impl<C: ValueCodec> EngineInner<C>
where
    C::Value: Clone,
{
    /// Core append: serialize, encode, mirror into the cache, park in the
    /// write buffer, and register in the key index.
    fn append_record(&mut self, key: &[u8], value: &C::Value) -> Result<u32, EngineError> {
        // Serialize before touching any state: a codec failure must leave
        // the store exactly as it was.
        let payload = self.codec.serialize(value)?;

        let id = self.mint_id()?;
        let hash = self.hasher.hash_key(key);
        let data = block::encode_block(id, hash, key, &payload)?;

        self.cache.add(CacheEntry {
            id,
            key_hash: hash,
            key: key.to_vec(),
            value: value.clone(),
        });
        self.buffer.append(id, data);
        if self.buffer.size() > self.flush_threshold {
            self.flush_buffer()?;
        }

        self.key_index.entry(hash).or_default().push(id);
        self.item_count += 1;
        trace!(id, key = %HexKey(key), "record appended");
        Ok(id)
    }

    /// Resolves a record by id, trying the cache, then the write buffer,
    /// then the file.
    fn get_by_id(&mut self, id: u32) -> Result<(Vec<u8>, C::Value), EngineError> {
        if self.tombstones.contains(&id) {
            return Err(EngineError::NotFound);
        }

        if let Some(entry) = self.cache.get(id) {
            let key = entry.key.clone();
            let value = entry.value.clone();
            self.cache.touch(id);
            return Ok((key, value));
        }

        // A buffered block has no file offset yet; make the file catch up.
        if self.buffer.contains(id) {
            self.flush_buffer()?;
        }

        let pos = *self.offsets.get(&id).ok_or(EngineError::NotFound)?;
        let (header, key, payload) = self.read_block_at(pos)?;
        if header.id != id {
            return Err(EngineError::CorruptFile(format!(
                "block at offset {pos} carries id {} instead of {id}",
                header.id
            )));
        }

        let value = self.codec.deserialize(&payload)?;
        self.cache.add(CacheEntry {
            id,
            key_hash: header.key_hash,
            key: key.clone(),
            value: value.clone(),
        });
        Ok((key, value))
    }

    /// Walks the key-index candidates for `hash`, returning the id whose
    /// key byte-equals `key`, if any live record matches.
    fn find_live(&mut self, key: &[u8], hash: u32) -> Result<Option<u32>, EngineError> {
        let candidates = match self.key_index.get(&hash) {
            Some(ids) => ids.clone(),
            None => return Ok(None),
        };
        for id in candidates {
            match self.get_by_id(id) {
                Ok((record_key, _)) if record_key == key => return Ok(Some(id)),
                Ok(_) => continue,
                Err(EngineError::NotFound) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }
}

impl<C: ValueCodec> EngineInner<C> {
    /// Applies a delete: tombstone, cache eviction, buffer withdrawal, and
    /// key-index removal.
    fn tombstone(&mut self, id: u32, hash: u32) {
        self.tombstones.insert(id);
        self.cache.remove(id);
        self.buffer.remove(id);

        if let Some(ids) = self.key_index.get_mut(&hash) {
            ids.retain(|&candidate| candidate != id);
            if ids.is_empty() {
                self.key_index.remove(&hash);
            }
        }
        self.item_count -= 1;
    }

    /// Writes all pending blocks to the file and records their absolute
    /// offsets. A no-op on an empty buffer.
    fn flush_buffer(&mut self) -> Result<(), EngineError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let bytes = self.buffer.size();
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| EngineError::Internal("store handle is closed".into()))?;

        let flushed = match self.buffer.flush(file) {
            Ok(flushed) => flushed,
            Err(e) => {
                // Unknown how much of the batch reached the file.
                self.corrupted = true;
                return Err(e.into());
            }
        };

        for entry in &flushed {
            self.offsets.insert(entry.id, self.current_offset + entry.offset);
        }
        self.current_offset += bytes;
        debug!(bytes, blocks = flushed.len(), "write buffer flushed");
        Ok(())
    }

    // --------------------------------------------------------------------------------------------
    // Load scan and compaction
    // --------------------------------------------------------------------------------------------

    /// Rebuilds all indices from a sequential scan of the data file.
    ///
    /// Every block's key hash is recomputed from its key bytes; a mismatch
    /// means the file (or the configured hasher) is wrong, and the store
    /// refuses to open.
    fn load_scan(&mut self) -> Result<(), EngineError> {
        let file = self
            .file
            .as_ref()
            .ok_or_else(|| EngineError::Internal("store handle is closed".into()))?;
        // The mmap is read-only and dropped before any write happens.
        let mmap = unsafe { Mmap::map(file)? };

        let mut pos = 0usize;
        let mut max_id = 0u32;
        let mut count = 0u64;

        while pos < mmap.len() {
            if pos + BLOCK_HEADER_SIZE > mmap.len() {
                return Err(EngineError::CorruptFile(format!(
                    "truncated header at offset {pos}"
                )));
            }
            let header = BlockHeader::decode(&mmap[pos..pos + BLOCK_HEADER_SIZE])
                .map_err(|e| EngineError::CorruptFile(format!("offset {pos}: {e}")))?;

            let end = pos + header.length as usize;
            if end > mmap.len() {
                return Err(EngineError::CorruptFile(format!(
                    "block at offset {pos} extends past end of file"
                )));
            }

            let key_start = pos + BLOCK_HEADER_SIZE;
            let key = &mmap[key_start..key_start + header.key_length as usize];
            if self.hasher.hash_key(key) != header.key_hash {
                return Err(EngineError::CorruptFile(format!(
                    "key hash mismatch at offset {pos}"
                )));
            }

            self.offsets.insert(header.id, pos as u64);
            self.key_index.entry(header.key_hash).or_default().push(header.id);
            max_id = max_id.max(header.id);
            count += 1;
            pos = end;
        }

        self.next_id = u64::from(max_id) + 1;
        self.item_count = count;
        self.current_offset = pos as u64;
        debug!(blocks = count, bytes = pos, "load scan complete");
        Ok(())
    }

    /// Streams the data file into the temp file, omitting tombstoned
    /// blocks, then renames the temp file over the original.
    ///
    /// A store with zero live bytes ends up with no file at all. Rename is
    /// the only atomicity primitive relied upon; if the process dies
    /// between the copy and the rename, the next `open` discards the temp
    /// file and the original (with its tombstoned blocks intact) wins.
    fn compact(&mut self) -> Result<(), EngineError> {
        let src = File::open(&self.path)?;
        let src_len = src.metadata()?.len();

        let mut live_bytes = 0u64;
        if src_len > 0 {
            let mmap = unsafe { Mmap::map(&src)? };
            let mut out = BufWriter::new(File::create(&self.temp_path)?);

            let mut pos = 0usize;
            while pos < mmap.len() {
                if pos + BLOCK_HEADER_SIZE > mmap.len() {
                    return Err(EngineError::CorruptFile(format!(
                        "truncated header at offset {pos}"
                    )));
                }
                let header = BlockHeader::decode(&mmap[pos..pos + BLOCK_HEADER_SIZE])
                    .map_err(|e| EngineError::CorruptFile(format!("offset {pos}: {e}")))?;
                let end = pos + header.length as usize;
                if end > mmap.len() {
                    return Err(EngineError::CorruptFile(format!(
                        "block at offset {pos} extends past end of file"
                    )));
                }

                if !self.tombstones.contains(&header.id) {
                    out.write_all(&mmap[pos..end])?;
                    live_bytes += u64::from(header.length);
                }
                pos = end;
            }

            let out = out
                .into_inner()
                .map_err(|e| EngineError::Io(e.into_error()))?;
            out.sync_all()?;
        }
        drop(src);

        if live_bytes == 0 {
            // Logically empty store: no file is the correct end state.
            fs::remove_file(&self.path)?;
            if self.temp_path.exists() {
                fs::remove_file(&self.temp_path)?;
            }
            info!("store compacted away (no live records)");
        } else {
            fs::remove_file(&self.path)?;
            fs::rename(&self.temp_path, &self.path)?;
            info!(live_bytes, "store compacted");
        }
        Ok(())
    }

    /// Drops all in-memory state; the handle is dead after this.
    fn invalidate(&mut self) {
        self.cache.clear();
        self.buffer = WriteBuffer::new();
        self.offsets.clear();
        self.key_index.clear();
        self.tombstones.clear();
        self.item_count = 0;
        self.current_offset = 0;
    }
}

// ------------------------------------------------------------------------------------------------
// Helpers
// ------------------------------------------------------------------------------------------------

/// Creates the store sub-directory with owner-only permissions.
#[cfg(unix)]
fn create_store_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    if dir.exists() {
        return Ok(());
    }
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_store_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

/// Compact hex rendering of key bytes for trace output.
struct HexKey<'a>(&'a [u8]);

impl std::fmt::Display for HexKey<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.len() <= 32 {
            for byte in self.0 {
                write!(f, "{byte:02x}")?;
            }
        } else {
            for byte in &self.0[..16] {
                write!(f, "{byte:02x}")?;
            }
            write!(f, "...[{} bytes]", self.0.len())?;
        }
        Ok(())
    }
}
