//! Shared fixtures for the engine test suite.

use std::sync::Once;

use tempfile::TempDir;

use crate::codec::RawCodec;
use crate::engine::{DB_DIR, DB_EXT, Engine, EngineConfig};
use crate::hash::{Crc32Hasher, KeyHasher};

/// Installs the fmt subscriber once per process; honors `RUST_LOG`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Opens a raw-bytes engine under a temp directory.
pub fn open_raw(dir: &TempDir, name: &str, config: EngineConfig) -> Engine<RawCodec> {
    init_tracing();
    Engine::open(dir.path(), name, config, RawCodec, Box::new(Crc32Hasher))
        .expect("engine should open")
}

/// Path of the engine's data file inside the temp directory.
pub fn data_file(dir: &TempDir, name: &str) -> std::path::PathBuf {
    dir.path().join(DB_DIR).join(format!("{name}.{DB_EXT}"))
}

/// Hasher that maps every key to the same hash, forcing collisions.
pub struct ConstHasher(pub u32);

impl KeyHasher for ConstHasher {
    fn hash_key(&self, _key: &[u8]) -> u32 {
        self.0
    }
}

pub fn key(i: u32) -> Vec<u8> {
    format!("key-{i:05}").into_bytes()
}

pub fn value(i: u32) -> Vec<u8> {
    format!("value-{i:05}").into_bytes()
}
