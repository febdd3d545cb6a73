//! Coalescing write buffer.
//!
//! Encoded blocks are not written to the data file one by one: they
//! accumulate here, in **append order**, until the engine's flush threshold
//! trips (or a read forces the file to catch up). A buffered record can
//! still be withdrawn before it ever reaches disk; deleting a record that
//! only lives in the buffer costs no I/O at all.
//!
//! Ordering is the load-bearing property: a flush writes surviving entries
//! in the exact order they were appended, and reports each entry's offset
//! relative to the start of the flush. The engine turns those into absolute
//! file offsets by adding the end-of-file position at flush start.
//!
//! A failed flush leaves the buffer in an undefined state; the engine
//! responds by marking the whole store corrupted.


use std::collections::HashMap;
use std::io::{self, Write};

// ------------------------------------------------------------------------------------------------
// Types
// ------------------------------------------------------------------------------------------------

/// A flushed record's id and its offset relative to the flush start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdOffset {
    /// Record id.
    pub id: u32,

    /// Byte offset of the record's block, relative to the first byte
    /// written by this flush.
    pub offset: u64,
}

/// One pending block.
struct BuffEntry {
    id: u32,
    data: Vec<u8>,
    deleted: bool,
}

/// An ordered collection of encoded blocks awaiting a batched append.
#[derive(Default)]
pub struct WriteBuffer {
    /// Pending entries in append order.
    entries: Vec<BuffEntry>,

    /// id → position in `entries`. Ids are unique: the engine mints a
    /// fresh id for every append, updates included.
    index: HashMap<u32, usize>,

    /// Total bytes of non-deleted entries, the flush-trigger metric.
    accumulated: u64,
}

impl WriteBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a pending write of `data` under `id`.
    pub fn append(&mut self, id: u32, data: Vec<u8>) {
        self.accumulated += data.len() as u64;
        self.index.insert(id, self.entries.len());
        self.entries.push(BuffEntry {
            id,
            data,
            deleted: false,
        });
    }

    /// Marks the entry as deleted so the next flush skips it.
    ///
    /// Silently succeeds if the id is absent or already marked.
    pub fn remove(&mut self, id: u32) {
        if let Some(&pos) = self.index.get(&id) {
            let entry = &mut self.entries[pos];
            if !entry.deleted {
                entry.deleted = true;
                self.accumulated -= entry.data.len() as u64;
            }
        }
    }

    /// True iff the id has been appended and not marked deleted.
    pub fn contains(&self, id: u32) -> bool {
        self.index
            .get(&id)
            .is_some_and(|&pos| !self.entries[pos].deleted)
    }

    /// Total bytes of non-deleted entries currently buffered.
    pub fn size(&self) -> u64 {
        self.accumulated
    }

    /// True when no entries are pending (deleted-only contents count as
    /// pending until the next flush discards them).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes all non-deleted entries to `writer` in append order.
    ///
    /// Returns each written entry's id and flush-relative offset; deleted
    /// entries contribute no bytes and consume no offset. On success the
    /// buffer is empty. On error the buffer state is undefined and the
    /// store must be treated as corrupted.
    pub fn flush(&mut self, writer: &mut impl Write) -> io::Result<Vec<IdOffset>> {
        let mut flushed = Vec::new();
        let mut offset = 0u64;
        for entry in &self.entries {
            if entry.deleted {
                continue;
            }
            writer.write_all(&entry.data)?;
            flushed.push(IdOffset {
                id: entry.id,
                offset,
            });
            offset += entry.data.len() as u64;
        }
        writer.flush()?;

        self.entries.clear();
        self.index.clear();
        self.accumulated = 0;
        Ok(flushed)
    }
}
