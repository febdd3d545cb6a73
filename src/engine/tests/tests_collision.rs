use tempfile::TempDir;

use super::helpers::{ConstHasher, init_tracing};
use crate::codec::RawCodec;
use crate::engine::{Engine, EngineConfig, EngineError};

fn open_colliding(dir: &TempDir) -> Engine<RawCodec> {
    init_tracing();
    Engine::open(
        dir.path(),
        "collide",
        EngineConfig::default(),
        RawCodec,
        Box::new(ConstHasher(0xDEAD_BEEF)),
    )
    .expect("engine should open")
}

/// Scenario: two keys forced onto the same hash are still resolved to
/// their own values by byte-equal key comparison.
#[test]
#[allow(non_snake_case)]
fn collision__keys_sharing_a_hash_stay_distinct() {
    let dir = TempDir::new().unwrap();
    let engine = open_colliding(&dir);

    engine.append(b"alpha", &b"one".to_vec()).unwrap();
    engine.append(b"bravo", &b"two".to_vec()).unwrap();

    assert_eq!(engine.get(b"alpha").unwrap(), b"one".to_vec());
    assert_eq!(engine.get(b"bravo").unwrap(), b"two".to_vec());
    assert!(matches!(engine.get(b"charlie"), Err(EngineError::NotFound)));
}

/// Scenario: deleting one key of a colliding pair leaves the other fully
/// usable, including updates.
#[test]
#[allow(non_snake_case)]
fn collision__delete_touches_only_the_matching_key() {
    let dir = TempDir::new().unwrap();
    let engine = open_colliding(&dir);

    engine.append(b"alpha", &b"one".to_vec()).unwrap();
    engine.append(b"bravo", &b"two".to_vec()).unwrap();

    engine.delete(b"alpha").unwrap();
    assert!(matches!(engine.get(b"alpha"), Err(EngineError::NotFound)));
    assert_eq!(engine.get(b"bravo").unwrap(), b"two".to_vec());

    engine.update(b"bravo", &b"three".to_vec()).unwrap();
    assert_eq!(engine.get(b"bravo").unwrap(), b"three".to_vec());
    assert_eq!(engine.item_count().unwrap(), 1);
}

/// Scenario: a colliding store survives close and reopen; the load scan
/// rebuilds one bucket with every id and reads still disambiguate by key.
#[test]
#[allow(non_snake_case)]
fn collision__survives_reopen() {
    let dir = TempDir::new().unwrap();
    let engine = open_colliding(&dir);

    engine.append(b"alpha", &b"one".to_vec()).unwrap();
    engine.append(b"bravo", &b"two".to_vec()).unwrap();
    engine.close().unwrap();

    let engine = open_colliding(&dir);
    assert_eq!(engine.get(b"alpha").unwrap(), b"one".to_vec());
    assert_eq!(engine.get(b"bravo").unwrap(), b"two".to_vec());
    assert_eq!(engine.item_count().unwrap(), 2);
}
