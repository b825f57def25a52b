//! Persistent key-value store backing tokens, preferences and the
//! current job id.
//!
//! Values are strings kept in a single JSON object on disk. Every
//! mutation rewrites the file and only takes effect in memory once the
//! write succeeded. There is no locking (one process at a time).

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use koma_core::view_state::PersistedMode;

#[derive(Debug, Clone, Default)]
pub struct PersistentStore {
    /// Backing file; `None` keeps the store in memory only.
    path: Option<PathBuf>,
    values: BTreeMap<String, String>,
}

impl PersistentStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, io::Error> {
        let path = path.into();
        let values = match fs::read(&path) {
            Ok(buf) => serde_json::from_slice(&buf)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e),
        };
        tracing::debug!(path = %path.display(), keys = values.len(), "Opened state store");
        Ok(Self {
            path: Some(path),
            values,
        })
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Store `value` under `key`. Returns whether anything changed; an
    /// unchanged value does not touch the file.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<bool, io::Error> {
        let value = value.into();
        if self.get(key) == Some(value.as_str()) {
            return Ok(false);
        }
        let mut values = self.values.clone();
        values.insert(key.to_string(), value);
        self.commit(values)?;
        Ok(true)
    }

    pub fn remove(&mut self, key: &str) -> Result<bool, io::Error> {
        if !self.values.contains_key(key) {
            return Ok(false);
        }
        let mut values = self.values.clone();
        values.remove(key);
        self.commit(values)?;
        Ok(true)
    }

    /// Drop every key.
    pub fn clear(&mut self) -> Result<(), io::Error> {
        self.commit(BTreeMap::new())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Read a display mode, falling back to its default.
    pub fn mode<M: PersistedMode>(&self) -> M {
        M::from_stored(self.get(M::KEY))
    }

    pub fn set_mode<M: PersistedMode>(&mut self, mode: M) -> Result<bool, io::Error> {
        self.set(M::KEY, mode.to_string())
    }

    /// Write `values` to disk, then adopt them.
    fn commit(&mut self, values: BTreeMap<String, String>) -> Result<(), io::Error> {
        if let Some(path) = &self.path {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let json = serde_json::to_string_pretty(&values)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            fs::write(path, json)?;
        }
        self.values = values;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use koma_core::view_state::{MapMode, ViewerMode, KEY_JOB_ID, KEY_MAP_MODE};
    use tempfile::tempdir;

    #[test]
    fn values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut store = PersistentStore::open(&path).unwrap();
        assert!(store.is_empty());
        store.set(KEY_JOB_ID, "42").unwrap();
        store.set_mode(MapMode::T2).unwrap();

        let reopened = PersistentStore::open(&path).unwrap();
        assert_eq!(reopened.get(KEY_JOB_ID), Some("42"));
        assert_eq!(reopened.get(KEY_MAP_MODE), Some("T2"));
        assert_eq!(reopened.mode::<MapMode>(), MapMode::T2);
    }

    #[test]
    fn unchanged_value_is_not_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut store = PersistentStore::open(&path).unwrap();

        assert!(store.set("username", "ana").unwrap());
        fs::remove_file(&path).unwrap();
        assert!(!store.set("username", "ana").unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn modes_default_when_missing_or_invalid() {
        let mut store = PersistentStore::in_memory();
        assert_eq!(store.mode::<MapMode>(), MapMode::T1);
        assert_eq!(store.mode::<ViewerMode>(), ViewerMode::Slices);

        store.set(KEY_MAP_MODE, "bogus").unwrap();
        assert_eq!(store.mode::<MapMode>(), MapMode::T1);
    }

    #[test]
    fn clear_removes_everything() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut store = PersistentStore::open(&path).unwrap();
        store.set("token", "abc").unwrap();
        store.set("username", "ana").unwrap();

        store.clear().unwrap();
        assert!(PersistentStore::open(&path).unwrap().is_empty());
        assert!(!store.remove("token").unwrap());
    }

    #[test]
    fn failed_write_leaves_values_untouched() {
        let dir = tempdir().unwrap();
        let parent = dir.path().join("state");
        let path = parent.join("state.json");
        let mut store = PersistentStore::open(&path).unwrap();
        store.set("token", "abc").unwrap();

        fs::remove_dir_all(&parent).unwrap();
        fs::write(&parent, "in the way").unwrap();

        assert!(store.set("token", "xyz").is_err());
        assert!(store.set("username", "ana").is_err());
        assert!(store.remove("token").is_err());
        assert!(store.clear().is_err());
        assert_eq!(store.get("token"), Some("abc"));
        assert!(store.get("username").is_none());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "not json").unwrap();
        let err = PersistentStore::open(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
