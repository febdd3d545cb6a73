use tempfile::TempDir;

use super::helpers::{data_file, key, open_raw, value};
use crate::engine::{DB_DIR, EngineConfig, EngineError, TEMP_FILE};

/// Scenario: closing after deletes rewrites the file with only live
/// blocks; a reopen sees exactly the survivors.
#[test]
#[allow(non_snake_case)]
fn compaction__close_drops_dead_blocks() {
    let dir = TempDir::new().unwrap();
    let engine = open_raw(&dir, "compact", EngineConfig::default());

    for i in 0..100 {
        engine.append(&key(i), &value(i)).unwrap();
    }
    engine.flush().unwrap();
    for i in 0..100 {
        if i % 2 == 0 {
            engine.delete(&key(i)).unwrap();
        }
    }
    let len_before = std::fs::metadata(data_file(&dir, "compact")).unwrap().len();

    engine.close().unwrap();
    let len_after = std::fs::metadata(data_file(&dir, "compact")).unwrap().len();
    assert!(len_after < len_before);
    assert!(!dir.path().join(DB_DIR).join(TEMP_FILE).exists());

    let engine = open_raw(&dir, "compact", EngineConfig::default());
    assert_eq!(engine.item_count().unwrap(), 50);
    for i in 0..100 {
        if i % 2 == 0 {
            assert!(matches!(engine.get(&key(i)), Err(EngineError::NotFound)));
        } else {
            assert_eq!(engine.get(&key(i)).unwrap(), value(i));
        }
    }
}

/// Scenario: closing without any delete leaves the file byte-for-byte
/// untouched; compaction only runs when tombstones exist.
#[test]
#[allow(non_snake_case)]
fn compaction__skipped_when_nothing_deleted() {
    let dir = TempDir::new().unwrap();
    let engine = open_raw(&dir, "clean", EngineConfig::default());

    for i in 0..10 {
        engine.append(&key(i), &value(i)).unwrap();
    }
    engine.flush().unwrap();
    let before = std::fs::read(data_file(&dir, "clean")).unwrap();

    engine.close().unwrap();
    let after = std::fs::read(data_file(&dir, "clean")).unwrap();
    assert_eq!(before, after);
}

/// Scenario: a temp file abandoned by an interrupted compaction is
/// discarded on the next open instead of being mistaken for data.
#[test]
#[allow(non_snake_case)]
fn compaction__stale_temp_file_removed_on_open() {
    let dir = TempDir::new().unwrap();
    let engine = open_raw(&dir, "stale", EngineConfig::default());
    engine.append(&key(0), &value(0)).unwrap();
    engine.close().unwrap();

    let temp = dir.path().join(DB_DIR).join(TEMP_FILE);
    std::fs::write(&temp, b"leftover garbage").unwrap();

    let engine = open_raw(&dir, "stale", EngineConfig::default());
    assert!(!temp.exists());
    assert_eq!(engine.get(&key(0)).unwrap(), value(0));
}

/// Scenario: destroy closes the store and removes its file in one step,
/// even with writes still buffered.
#[test]
#[allow(non_snake_case)]
fn compaction__destroy_removes_file() {
    let dir = TempDir::new().unwrap();
    let engine = open_raw(&dir, "doomed", EngineConfig::default());

    engine.append(&key(0), &value(0)).unwrap();
    engine.flush().unwrap();
    engine.append(&key(1), &value(1)).unwrap(); // still buffered

    engine.destroy().unwrap();
    assert!(!data_file(&dir, "doomed").exists());
}
