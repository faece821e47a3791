//! Application configuration management.
//!
//! Configuration is stored at `~/.config/fraudscope/config.json` and can be
//! overridden per run through `FRAUDSCOPE_*` environment variables.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{DEFAULT_BASE_URL, REQUEST_TIMEOUT_SECS};
use crate::auth::{FileStorage, KeychainStorage, MemoryStorage, Storage};

/// Application name used for config/data directory paths
const APP_NAME: &str = "fraudscope";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Token file name under the data directory
const TOKEN_FILE: &str = "session.json";

pub const ENV_API_URL: &str = "FRAUDSCOPE_API_URL";
pub const ENV_TIMEOUT_SECS: &str = "FRAUDSCOPE_TIMEOUT_SECS";
pub const ENV_STORAGE: &str = "FRAUDSCOPE_STORAGE";
pub const ENV_PASSPHRASE: &str = "FRAUDSCOPE_PASSPHRASE";

/// Where the token store keeps credentials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keychain,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "keychain" => Ok(Self::Keychain),
            "memory" => Ok(Self::Memory),
            other => anyhow::bail!("Unknown storage backend '{}' (file, keychain, memory)", other),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::File => "file",
            Self::Keychain => "keychain",
            Self::Memory => "memory",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub timeout_secs: u64,
    pub storage: StorageBackend,
    pub last_email: Option<String>,
    /// Directory for rolling log files; stderr only when unset.
    pub log_dir: Option<PathBuf>,
    /// Passphrase sealing the token file. Only ever read from the
    /// environment.
    #[serde(skip)]
    pub passphrase: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: REQUEST_TIMEOUT_SECS,
            storage: StorageBackend::default(),
            last_email: None,
            log_dir: None,
            passphrase: None,
        }
    }
}

impl Config {
    /// Load the config file (or defaults) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Record the last used login email without persisting any
    /// environment overrides.
    pub fn remember_email(email: &str) -> Result<()> {
        let mut stored = Self::load_file()?;
        stored.last_email = Some(email.to_string());
        stored.save()
    }

    /// Apply `FRAUDSCOPE_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup(ENV_API_URL) {
            debug!(url = %url, "Base URL overridden from environment");
            self.base_url = url;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            self.timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of seconds", ENV_TIMEOUT_SECS))?;
        }
        if let Some(storage) = lookup(ENV_STORAGE) {
            self.storage = storage.parse()?;
        }
        if let Some(passphrase) = lookup(ENV_PASSPHRASE) {
            self.passphrase = Some(passphrase);
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir =
            dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn token_file(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join(TOKEN_FILE))
    }

    /// Open the configured credential storage.
    pub fn open_storage(&self) -> Result<Arc<dyn Storage>> {
        let storage: Arc<dyn Storage> = match self.storage {
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
            StorageBackend::Keychain => Arc::new(KeychainStorage::new()),
            StorageBackend::File => {
                let path = self.token_file()?;
                match &self.passphrase {
                    Some(passphrase) => Arc::new(
                        FileStorage::open_sealed(&path, passphrase)
                            .context("Failed to open sealed token file")?,
                    ),
                    None => Arc::new(FileStorage::open(&path)),
                }
            }
        };
        debug!(backend = %self.storage, "Credential storage opened");
        Ok(storage)
    }
}
