//! Opaque key/value persistence for profile blobs.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::ProfileError;

/// Storage backend holding one string blob per key.
pub trait KeyValueStore {
    /// Returns the blob stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>, ProfileError>;

    /// Replaces the blob stored under `key`.
    fn set(&mut self, key: &str, blob: String) -> Result<(), ProfileError>;
}

/// In-process store, mostly for tests and throwaway sessions.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, ProfileError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, blob: String) -> Result<(), ProfileError> {
        let _ = self.entries.insert(key.to_owned(), blob);
        Ok(())
    }
}

/// Store keeping each key in its own `<key>.json` file inside a directory.
#[derive(Clone, Debug)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Opens the directory, creating it when missing.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ProfileError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Directory backing the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, ProfileError> {
        let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.');
        if key.is_empty() || key.starts_with('.') || !key.chars().all(allowed) {
            return Err(ProfileError::InvalidKey {
                key: key.to_owned(),
            });
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl KeyValueStore for DirectoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, ProfileError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(path) {
            Ok(blob) => Ok(Some(blob)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn set(&mut self, key: &str, blob: String) -> Result<(), ProfileError> {
        let path = self.path_for(key)?;
        fs::write(path, blob)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = format!("egg-merge-store-{}-{name}", std::process::id());
        std::env::temp_dir().join(dir)
    }

    #[test]
    fn memory_store_overwrites() {
        let mut store = MemoryStore::new();
        assert_eq!(store.get("a").expect("get"), None);
        store.set("a", "1".to_owned()).expect("set");
        store.set("a", "2".to_owned()).expect("set");
        assert_eq!(store.get("a").expect("get").as_deref(), Some("2"));
    }

    #[test]
    fn directory_store_persists_between_handles() {
        let dir = scratch_dir("persist");
        {
            let mut store = DirectoryStore::open(&dir).expect("open");
            store.set("player-1", "{}".to_owned()).expect("set");
        }
        let store = DirectoryStore::open(&dir).expect("reopen");
        assert_eq!(store.get("player-1").expect("get").as_deref(), Some("{}"));
        assert_eq!(store.get("player-2").expect("get"), None);
        fs::remove_dir_all(&dir).expect("cleanup");
    }

    #[test]
    fn directory_store_rejects_path_like_keys() {
        let dir = scratch_dir("keys");
        let mut store = DirectoryStore::open(&dir).expect("open");
        for key in ["../escape", "a/b", "", ".hidden"] {
            assert!(matches!(
                store.set(key, String::new()),
                Err(ProfileError::InvalidKey { .. })
            ));
        }
        fs::remove_dir_all(&dir).expect("cleanup");
    }
}
