use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::sealed::SealedKey;

/// Durable key/value storage for client-side state.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    /// Remove every stored value.
    fn clear(&self) -> Result<()>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Process-local storage, used in tests and for `--storage memory`.
#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.values).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        lock(&self.values).remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        lock(&self.values).clear();
        Ok(())
    }
}

/// Storage backed by a single JSON document on disk.
///
/// The document is loaded into memory when opened and rewritten on every
/// change. With a `SealedKey` the document is encrypted at rest.
pub struct FileStorage {
    path: PathBuf,
    key: Option<SealedKey>,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open plaintext storage at `path`. A missing or unreadable file opens empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = Self::load_plain(&path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Discarding unreadable storage file");
            BTreeMap::new()
        });
        Self {
            path,
            key: None,
            values: Mutex::new(values),
        }
    }

    /// Open storage encrypted with a key derived from `passphrase`.
    ///
    /// A file that cannot be decrypted with this passphrase opens empty and is
    /// replaced on the next write.
    pub fn open_sealed(path: impl Into<PathBuf>, passphrase: &str) -> Result<Self> {
        let path = path.into();
        let existing = if path.exists() {
            Some(std::fs::read(&path).context("Failed to read storage file")?)
        } else {
            None
        };

        let (key, values) = match existing {
            Some(bytes) => match SealedKey::unseal(passphrase, &bytes) {
                Ok((key, plaintext)) => {
                    let values = serde_json::from_slice(&plaintext).unwrap_or_else(|e| {
                        warn!(error = %e, "Sealed storage holds malformed JSON");
                        BTreeMap::new()
                    });
                    (key, values)
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Cannot unseal storage file, starting empty");
                    (SealedKey::derive(passphrase)?, BTreeMap::new())
                }
            },
            None => (SealedKey::derive(passphrase)?, BTreeMap::new()),
        };

        Ok(Self {
            path,
            key: Some(key),
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_plain(path: &Path) -> Result<BTreeMap<String, String>> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(path).context("Failed to read storage file")?;
        let values = serde_json::from_str(&contents).context("Failed to parse storage file")?;
        Ok(values)
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create storage directory")?;
        }
        let contents = serde_json::to_vec_pretty(values)?;
        let bytes = match &self.key {
            Some(key) => key.seal(&contents)?,
            None => contents,
        };
        std::fs::write(&self.path, bytes)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        debug!(path = %self.path.display(), entries = values.len(), "Storage persisted");
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = lock(&self.values);
        values.insert(key.to_string(), value.to_string());
        self.persist(&values)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = lock(&self.values);
        if values.remove(key).is_some() {
            self.persist(&values)?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        lock(&self.values).clear();
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to remove storage file")?;
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::temp_path;
    use super::*;

    #[test]
    fn test_memory_storage_set_get_clear() {
        let storage = MemoryStorage::new();
        assert!(storage.get("access_token").is_none());
        storage.set("access_token", "abc").unwrap();
        assert_eq!(storage.get("access_token").as_deref(), Some("abc"));
        storage.clear().unwrap();
        assert!(storage.get("access_token").is_none());
    }

    #[test]
    fn test_file_storage_survives_reopen() {
        let path = temp_path("storage.json");
        {
            let storage = FileStorage::open(&path);
            storage.set("refresh_token", "r1").unwrap();
            storage.set("access_token", "a1").unwrap();
            storage.remove("access_token").unwrap();
        }
        let reopened = FileStorage::open(&path);
        assert_eq!(reopened.get("refresh_token").as_deref(), Some("r1"));
        assert!(reopened.get("access_token").is_none());

        reopened.clear().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_file_storage_treats_garbage_as_empty() {
        let path = temp_path("storage.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();

        let storage = FileStorage::open(&path);
        assert!(storage.get("user").is_none());
        storage.set("user", "{}").unwrap();
        assert_eq!(FileStorage::open(&path).get("user").as_deref(), Some("{}"));
    }

    #[test]
    fn test_sealed_storage_requires_passphrase() {
        let path = temp_path("storage.sealed");
        {
            let storage = FileStorage::open_sealed(&path, "correct horse").unwrap();
            storage.set("refresh_token", "secret-refresh").unwrap();
        }

        let raw = std::fs::read(&path).unwrap();
        assert!(!String::from_utf8_lossy(&raw).contains("secret-refresh"));

        let same = FileStorage::open_sealed(&path, "correct horse").unwrap();
        assert_eq!(same.get("refresh_token").as_deref(), Some("secret-refresh"));

        let wrong = FileStorage::open_sealed(&path, "battery staple").unwrap();
        assert!(wrong.get("refresh_token").is_none());
    }
}
