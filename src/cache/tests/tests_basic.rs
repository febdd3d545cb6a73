//! Core LRU cache contract: add, get, touch, remove, contains.

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use crate::cache::LruCache;
    use crate::cache::tests::entry;

    /// # Scenario
    /// Insert one entry and read it back.
    ///
    /// # Expected behavior
    /// `get` returns the entry; key and value match what was inserted.
    #[test]
    fn cache__add_then_get() {
        let mut cache = LruCache::new(4);
        cache.add(entry(1));

        let hit = cache.get(1).unwrap();
        assert_eq!(hit.id, 1);
        assert_eq!(hit.key, b"Item1");
        assert_eq!(hit.value, b"value-1");
    }

    /// # Scenario
    /// Look up an id that was never inserted.
    ///
    /// # Expected behavior
    /// `get` returns `None`; `contains` is false and stays counter-free.
    #[test]
    fn cache__get_missing_returns_none() {
        let mut cache = LruCache::<Vec<u8>>::new(4);
        assert!(cache.get(42).is_none());
        assert!(!cache.contains(42));
    }

    /// # Scenario
    /// Remove an entry and probe for it afterwards.
    ///
    /// # Expected behavior
    /// First `remove` reports `true`, second `false`; the entry is gone.
    #[test]
    fn cache__remove_is_idempotent() {
        let mut cache = LruCache::new(4);
        cache.add(entry(1));

        assert!(cache.remove(1));
        assert!(!cache.remove(1));
        assert!(!cache.contains(1));
        assert_eq!(cache.len(), 0);
    }

    /// # Scenario
    /// Re-add an id that is already cached.
    ///
    /// # Expected behavior
    /// The entry is replaced in place, no duplicate, len unchanged.
    #[test]
    fn cache__re_add_replaces_entry() {
        let mut cache = LruCache::new(4);
        cache.add(entry(1));

        let mut replacement = entry(1);
        replacement.value = b"fresh".to_vec();
        cache.add(replacement);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(1).unwrap().value, b"fresh");
    }

    /// # Scenario
    /// `touch` on an absent id and on a one-entry cache.
    ///
    /// # Expected behavior
    /// Both are silent no-ops.
    #[test]
    fn cache__touch_edge_cases_are_noops() {
        let mut cache = LruCache::new(4);
        cache.touch(9); // empty cache

        cache.add(entry(1));
        cache.touch(1); // single entry
        cache.touch(9); // absent id
        assert!(cache.contains(1));
    }

    /// # Scenario
    /// `clear` empties the cache but keeps the counters.
    ///
    /// # Expected behavior
    /// All entries dropped, hit-rate history preserved.
    #[test]
    fn cache__clear_drops_entries_keeps_stats() {
        let mut cache = LruCache::new(4);
        cache.add(entry(1));
        let _ = cache.get(1);

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.hit_rate() > 0.0);
    }
}
