//! Bounded LRU read cache for decoded records.
//!
//! Sits between the engine and the data file: every appended or
//! file-read record is mirrored here so that hot lookups never touch disk.
//! The cache tracks request/hit counters for the engine's hit-rate
//! statistic.
//!
//! # Design
//!
//! A node referenced by both a map and a recency list is the classic
//! aliasing headache, so the cache is built as an **arena**: nodes live in
//! a `Vec`, the id → slot map stores indices, and the doubly-linked
//! recency list holds `prev`/`next` slot indices. All operations are O(1);
//! freed slots are recycled through a free list so the arena never grows
//! past capacity.
//!
//! Recency runs from `head` (least recently used, next to be evicted) to
//! `tail` (most recently used). Note that [`LruCache::get`] deliberately
//! does **not** promote the entry; recency updates are an explicit
//! [`LruCache::touch`], which the engine issues on a read hit.
//!
//! The cache is not internally synchronised; the engine serialises calls
//! under its handle lock.

#[cfg(test)]
mod tests;

use std::collections::HashMap;

// ------------------------------------------------------------------------------------------------
// Entry and node types
// ------------------------------------------------------------------------------------------------

/// A cached, decoded record.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// Record id this entry caches.
    pub id: u32,

    /// Content hash of the key, mirrored from the block header.
    pub key_hash: u32,

    /// Raw key bytes.
    pub key: Vec<u8>,

    /// The decoded value as supplied by the caller's codec.
    pub value: V,
}

/// One arena slot: an occupied entry plus its recency-list links.
struct Node<V> {
    entry: CacheEntry<V>,
    prev: Option<usize>,
    next: Option<usize>,
}

// ------------------------------------------------------------------------------------------------
// LruCache
// ------------------------------------------------------------------------------------------------

/// A bounded least-recently-used cache keyed by record id.
pub struct LruCache<V> {
    /// Arena of nodes; `None` marks a free slot.
    nodes: Vec<Option<Node<V>>>,

    /// Recycled arena slots.
    free: Vec<usize>,

    /// id → arena slot.
    index: HashMap<u32, usize>,

    /// Least recently used end of the recency list.
    head: Option<usize>,

    /// Most recently used end of the recency list.
    tail: Option<usize>,

    /// Maximum number of entries; evicts at this bound.
    capacity: usize,

    /// Total number of `get` calls.
    requests: u64,

    /// Number of `get` calls that found their entry.
    hits: u64,
}

impl<V> LruCache<V> {
    /// Creates a cache holding at most `capacity` entries.
    ///
    /// The engine validates `capacity >= 1` before constructing a cache.
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity >= 1, "cache capacity must be >= 1");
        Self {
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
            index: HashMap::with_capacity(capacity),
            head: None,
            tail: None,
            capacity,
            requests: 0,
            hits: 0,
        }
    }

    /// Inserts an entry as the most recently used.
    ///
    /// At capacity, the least recently used entry is evicted first. If the
    /// id is already cached, its entry is replaced in place and promoted.
    pub fn add(&mut self, entry: CacheEntry<V>) {
        if let Some(&slot) = self.index.get(&entry.id) {
            if let Some(node) = &mut self.nodes[slot] {
                node.entry = entry;
            }
            self.promote(slot);
            return;
        }

        if self.index.len() == self.capacity
            && let Some(lru) = self.head
        {
            self.evict(lru);
        }

        let node = Node {
            entry,
            prev: None,
            next: None,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                slot
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };
        if let Some(node) = &self.nodes[slot] {
            self.index.insert(node.entry.id, slot);
        }
        self.attach_mru(slot);
    }

    /// Looks up an entry by id **without** changing its recency.
    ///
    /// Counts one request, and one hit if the entry is present.
    pub fn get(&mut self, id: u32) -> Option<&CacheEntry<V>> {
        self.requests += 1;
        let slot = *self.index.get(&id)?;
        self.hits += 1;
        self.nodes[slot].as_ref().map(|node| &node.entry)
    }

    /// Moves the entry to the most-recently-used position.
    ///
    /// No-op if the id is absent or fewer than two entries are cached.
    pub fn touch(&mut self, id: u32) {
        if self.index.len() < 2 {
            return;
        }
        if let Some(&slot) = self.index.get(&id) {
            self.promote(slot);
        }
    }

    /// Removes an entry, returning whether it was present.
    pub fn remove(&mut self, id: u32) -> bool {
        match self.index.remove(&id) {
            Some(slot) => {
                self.unlink(slot);
                self.nodes[slot] = None;
                self.free.push(slot);
                true
            }
            None => false,
        }
    }

    /// Looks up an entry without touching recency or the request/hit
    /// counters.
    ///
    /// For internal bookkeeping reads that should not show up in the
    /// hit-rate statistic; client-visible lookups go through
    /// [`get`](LruCache::get).
    pub fn peek(&self, id: u32) -> Option<&CacheEntry<V>> {
        let slot = *self.index.get(&id)?;
        self.nodes[slot].as_ref().map(|node| &node.entry)
    }

    /// Presence check; does not touch the request/hit counters.
    pub fn contains(&self, id: u32) -> bool {
        self.index.contains_key(&id)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Hit rate as a percentage in `[0, 100]`; `0` before any request.
    pub fn hit_rate(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.hits as f64 / self.requests as f64 * 100.0
        }
    }

    /// Resets the request/hit counters without touching cached entries.
    pub fn reset_stats(&mut self) {
        self.requests = 0;
        self.hits = 0;
    }

    /// Drops every entry and resets the recency list (counters survive).
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
    }

    // --------------------------------------------------------------------------------------------
    // Recency list plumbing
    // --------------------------------------------------------------------------------------------

    /// Detaches `slot` from the recency list, fixing up neighbours and the
    /// head/tail pointers.
    fn unlink(&mut self, slot: usize) {
        let (prev, next) = match &self.nodes[slot] {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(node) = &mut self.nodes[p] {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = &mut self.nodes[n] {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(node) = &mut self.nodes[slot] {
            node.prev = None;
            node.next = None;
        }
    }

    /// Attaches a detached `slot` at the MRU end.
    fn attach_mru(&mut self, slot: usize) {
        if let Some(node) = &mut self.nodes[slot] {
            node.prev = self.tail;
            node.next = None;
        }
        if let Some(old_tail) = self.tail
            && let Some(node) = &mut self.nodes[old_tail]
        {
            node.next = Some(slot);
        }
        self.tail = Some(slot);
        if self.head.is_none() {
            self.head = Some(slot);
        }
    }

    /// Moves `slot` to the MRU end.
    fn promote(&mut self, slot: usize) {
        if self.tail == Some(slot) {
            return;
        }
        self.unlink(slot);
        self.attach_mru(slot);
    }

    /// Evicts the node at `slot` (the current LRU).
    fn evict(&mut self, slot: usize) {
        if let Some(node) = &self.nodes[slot] {
            let id = node.entry.id;
            self.index.remove(&id);
        }
        self.unlink(slot);
        self.nodes[slot] = None;
        self.free.push(slot);
    }
}
