//! Local key-value persistence
//!
//! A small JSON file under the data directory that plays the role browser
//! local storage plays for a web client: the active wallet address and the
//! backend session survive restarts through it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Key holding the active wallet address
pub const WALLET_ADDRESS_KEY: &str = "walletAddress";

/// Key holding the serialized backend session
pub const SESSION_KEY: &str = "auth.session";

const STORE_FILE: &str = "local_storage.json";

/// File-backed string map
///
/// Every operation reads and rewrites the whole file, so clones of the same
/// store always observe each other's writes.
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    /// Open (or lazily create) the store inside `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, LocalStoreError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            path: dir.join(STORE_FILE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match self.read() {
            Ok(mut entries) => entries.remove(key),
            Err(e) => {
                tracing::warn!(path = ?self.path, "Ignoring unreadable local store: {}", e);
                None
            }
        }
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), LocalStoreError> {
        let mut entries = self.read().unwrap_or_default();
        entries.insert(key.to_string(), value.to_string());
        self.write(&entries)
    }

    pub fn remove(&self, key: &str) -> Result<(), LocalStoreError> {
        let mut entries = self.read().unwrap_or_default();
        if entries.remove(key).is_some() {
            self.write(&entries)?;
        }
        Ok(())
    }

    fn read(&self) -> Result<BTreeMap<String, String>, LocalStoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write(&self, entries: &BTreeMap<String, String>) -> Result<(), LocalStoreError> {
        let json = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

/// Errors from the local store
#[derive(Error, Debug)]
pub enum LocalStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt local store: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_set_get_remove() {
        let dir = tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();

        assert_eq!(store.get(WALLET_ADDRESS_KEY), None);
        store.set(WALLET_ADDRESS_KEY, "0xabc").unwrap();
        assert_eq!(store.get(WALLET_ADDRESS_KEY).as_deref(), Some("0xabc"));

        store.remove(WALLET_ADDRESS_KEY).unwrap();
        assert_eq!(store.get(WALLET_ADDRESS_KEY), None);
    }

    #[test]
    fn test_clones_share_state() {
        let dir = tempdir().unwrap();
        let a = LocalStore::open(dir.path()).unwrap();
        let b = a.clone();

        a.set(SESSION_KEY, "{}").unwrap();
        assert_eq!(b.get(SESSION_KEY).as_deref(), Some("{}"));
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        LocalStore::open(dir.path())
            .unwrap()
            .set(WALLET_ADDRESS_KEY, "0xdef")
            .unwrap();

        let reopened = LocalStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get(WALLET_ADDRESS_KEY).as_deref(), Some("0xdef"));
    }

    #[test]
    fn test_corrupt_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        std::fs::write(store.path(), "not json").unwrap();

        assert_eq!(store.get(WALLET_ADDRESS_KEY), None);
        store.set(WALLET_ADDRESS_KEY, "0x1").unwrap();
        assert_eq!(store.get(WALLET_ADDRESS_KEY).as_deref(), Some("0x1"));
    }
}
