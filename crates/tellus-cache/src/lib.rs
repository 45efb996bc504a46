//! Path-keyed byte-blob storage for generated chunks.
//!
//! Chunks are keyed by their octree path string. The store is deliberately
//! dumb: bytes in, bytes out, no format knowledge. Every I/O failure is
//! non-fatal and degrades to a cache miss; the caller falls back to full
//! recomputation (a warning is logged so persistent failures are visible).

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use hashbrown::HashMap;
use tracing::warn;

/// A path-keyed blob store for chunk payloads.
pub trait ChunkStore: Send + Sync {
    /// Persist a payload under a key. Failures are logged and swallowed.
    fn store(&self, key: &str, bytes: &[u8]);

    /// Fetch a payload. Any failure, including a missing entry, is a miss.
    fn load(&self, key: &str) -> Option<Vec<u8>>;

    /// Drop every stored payload.
    fn clear_all(&self);
}

/// Filesystem-backed store: one file per key under a root directory.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Create a store rooted at `root`. The directory is created lazily on
    /// the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn file_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.bin"))
    }
}

impl ChunkStore for FsStore {
    fn store(&self, key: &str, bytes: &[u8]) {
        if let Err(e) = fs::create_dir_all(&self.root) {
            warn!(key, error = %e, "chunk cache directory unavailable, skipping store");
            return;
        }
        if let Err(e) = fs::write(self.file_path(key), bytes) {
            warn!(key, error = %e, "failed to persist chunk, skipping store");
        }
    }

    fn load(&self, key: &str) -> Option<Vec<u8>> {
        match fs::read(self.file_path(key)) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(key, error = %e, "failed to read cached chunk, treating as miss");
                None
            }
        }
    }

    fn clear_all(&self) {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                warn!(root = %self.root.display(), error = %e, "failed to clear chunk cache");
                return;
            }
        };
        for entry in entries.flatten() {
            if let Err(e) = fs::remove_file(entry.path()) {
                warn!(path = %entry.path().display(), error = %e, "failed to remove cached chunk");
            }
        }
    }
}

/// In-memory store for tests and cache-less runs.
#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChunkStore for MemoryStore {
    fn store(&self, key: &str, bytes: &[u8]) {
        self.blobs
            .lock()
            .expect("memory store poisoned")
            .insert(key.to_owned(), bytes.to_vec());
    }

    fn load(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs
            .lock()
            .expect("memory store poisoned")
            .get(key)
            .cloned()
    }

    fn clear_all(&self) {
        self.blobs.lock().expect("memory store poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(store: &dyn ChunkStore) {
        store.store("40105", &[1, 2, 3, 255]);
        assert_eq!(store.load("40105"), Some(vec![1, 2, 3, 255]));
        assert_eq!(store.load("40106"), None);

        // Overwrite is last-write-wins.
        store.store("40105", &[9]);
        assert_eq!(store.load("40105"), Some(vec![9]));

        store.clear_all();
        assert_eq!(store.load("40105"), None);
    }

    #[test]
    fn test_memory_store_round_trip() {
        round_trip(&MemoryStore::new());
    }

    #[test]
    fn test_fs_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        round_trip(&FsStore::new(dir.path().join("chunks")));
    }

    #[test]
    fn test_fs_store_missing_directory_is_a_miss() {
        let store = FsStore::new("/nonexistent/tellus-cache-test");
        assert_eq!(store.load("0"), None);
        store.clear_all(); // no panic on a missing root
    }

    #[test]
    fn test_fs_store_byte_identity() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let payload: Vec<u8> = (0..=255).collect();
        store.store("7", &payload);
        assert_eq!(store.load("7"), Some(payload));
    }
}
