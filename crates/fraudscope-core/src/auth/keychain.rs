use anyhow::{Context, Result};
use keyring::Entry;
use tracing::debug;

use super::storage::Storage;
use super::tokens::STORAGE_KEYS;

const SERVICE_NAME: &str = "fraudscope";

/// Storage backed by the OS keychain, one entry per key.
pub struct KeychainStorage {
    service: String,
}

impl KeychainStorage {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    /// Use a custom keychain service name (one per backend profile).
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).context("Failed to create keyring entry")
    }
}

impl Default for KeychainStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for KeychainStorage {
    fn get(&self, key: &str) -> Option<String> {
        let entry = self.entry(key).ok()?;
        match entry.get_password() {
            Ok(value) => Some(value),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                debug!(key, error = %e, "Keychain read failed");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .context("Failed to store value in keychain")
    }

    fn remove(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }

    fn clear(&self) -> Result<()> {
        for key in STORAGE_KEYS {
            self.remove(key)?;
        }
        Ok(())
    }
}
