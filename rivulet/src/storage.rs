// Copyright (c) 2025 The Rivulet Project

//! Byte-oriented persistence.
//!
//! The core only relies on the [`Store`] contract: `put`, `get` and
//! prefix `scan`. It is used exclusively for recovery after restart;
//! richer backends are external collaborators. An in-memory store backs
//! tests and a flat-file store backs the CLI.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Key prefix for closed headers.
pub const HEADER_PREFIX: &str = "hdr:";
/// Key of the latest full-state snapshot.
pub const SNAPSHOT_KEY: &str = "state:latest";

/// A byte-oriented append store.
pub trait Store: Send {
    /// Store a value under a key, replacing any previous value.
    fn put(&mut self, key: &str, value: &[u8]) -> Result<()>;
    /// Fetch a value.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    /// All `(key, value)` pairs whose key starts with `prefix`, in key
    /// order.
    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;
}

/// An in-memory store for tests and ephemeral nodes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn put(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        Ok(self
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

/// A flat-file store: one file per key under a directory, the key hex
/// encoded in the file name.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open or create a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create store dir {}", root.display()))?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.bin", hex::encode(key)))
    }
}

impl Store for FileStore {
    fn put(&mut self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        fs::write(&path, value)
            .with_context(|| format!("failed to write {}", path.display()))
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.root).context("failed to list store dir")? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(hex_key) = name.strip_suffix(".bin") else {
                continue;
            };
            let Ok(raw) = hex::decode(hex_key) else {
                continue;
            };
            let Ok(key) = String::from_utf8(raw) else {
                continue;
            };
            if key.starts_with(prefix) {
                out.push((key, fs::read(entry.path())?));
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }
}

/// The storage key for a closed header.
pub fn header_key(sequence: i64) -> String {
    format!("{HEADER_PREFIX}{sequence:020}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &mut dyn Store) {
        store.put("hdr:001", b"one").unwrap();
        store.put("hdr:002", b"two").unwrap();
        store.put("state:latest", b"snap").unwrap();

        assert_eq!(store.get("hdr:001").unwrap().unwrap(), b"one");
        assert!(store.get("missing").unwrap().is_none());

        let headers = store.scan("hdr:").unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].0, "hdr:001");
        assert_eq!(headers[1].0, "hdr:002");

        // Overwrite replaces.
        store.put("hdr:001", b"uno").unwrap();
        assert_eq!(store.get("hdr:001").unwrap().unwrap(), b"uno");
    }

    #[test]
    fn memory_store_contract() {
        let mut store = MemoryStore::new();
        exercise(&mut store);
    }

    #[test]
    fn file_store_contract() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::open(dir.path()).unwrap();
        exercise(&mut store);
    }

    #[test]
    fn header_keys_sort_numerically() {
        assert!(header_key(2) < header_key(10));
        assert!(header_key(999) < header_key(1_000));
    }
}
