mod tests_basic;

use super::CacheEntry;

/// Builds a throwaway entry whose key/value derive from the id.
pub(super) fn entry(id: u32) -> CacheEntry<Vec<u8>> {
    CacheEntry {
        id,
        key_hash: id.wrapping_mul(31),
        key: format!("Item{id}").into_bytes(),
        value: format!("value-{id}").into_bytes(),
    }
}
