//! Credential persistence.
//!
//! This module provides:
//! - `Storage`: a small synchronous key/value store that survives restarts
//!   (`FileStorage`, `KeychainStorage`, `MemoryStorage`)
//! - `SealedKey`: passphrase-based encryption for the on-disk file
//! - `TokenStore`: the access/refresh token pair and current user, kept
//!   under fixed keys on top of a `Storage`
//!
//! Reads are synchronous so stored credentials are available as soon as the
//! application context is built. Malformed stored values read as absent.

pub mod keychain;
pub mod sealed;
pub mod storage;
pub mod tokens;

pub use keychain::KeychainStorage;
pub use sealed::SealedKey;
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use tokens::{TokenPair, TokenStore};
