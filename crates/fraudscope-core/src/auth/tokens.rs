use std::sync::Arc;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use super::storage::Storage;
use crate::models::User;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const USER_KEY: &str = "user";
pub const AUTH_TOKENS_KEY: &str = "auth_tokens";

/// Every key the token store writes; all of them go on logout.
pub const STORAGE_KEYS: [&str; 4] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY, AUTH_TOKENS_KEY];

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// The token pair and current user, persisted under fixed keys.
///
/// Write failures are logged and never interrupt the calling flow: the
/// in-process state of the backing storage is already updated.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn Storage>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.storage.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(key, error = %e, "Ignoring malformed stored value");
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(e) = self.storage.set(key, value) {
            warn!(key, error = %e, "Failed to persist value");
        }
    }

    fn write_json<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(json) => self.write(key, &json),
            Err(e) => warn!(key, error = %e, "Failed to serialize value"),
        }
    }

    fn non_empty(&self, key: &str) -> Option<String> {
        self.storage.get(key).filter(|v| !v.is_empty())
    }

    /// The stored pair, preferring the combined record.
    pub fn tokens(&self) -> Option<TokenPair> {
        if let Some(pair) = self.read_json::<TokenPair>(AUTH_TOKENS_KEY) {
            return Some(pair);
        }
        Some(TokenPair {
            access_token: self.non_empty(ACCESS_TOKEN_KEY)?,
            refresh_token: self.non_empty(REFRESH_TOKEN_KEY)?,
        })
    }

    pub fn set_tokens(&self, pair: &TokenPair) {
        self.write(ACCESS_TOKEN_KEY, &pair.access_token);
        self.write(REFRESH_TOKEN_KEY, &pair.refresh_token);
        self.write_json(AUTH_TOKENS_KEY, pair);
    }

    /// Replace the access token after a refresh, keeping the refresh token.
    pub fn set_access_token(&self, access_token: &str) {
        self.write(ACCESS_TOKEN_KEY, access_token);
        if let Some(refresh_token) = self.refresh_token() {
            self.write_json(AUTH_TOKENS_KEY, &TokenPair::new(access_token, refresh_token));
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.non_empty(ACCESS_TOKEN_KEY)
            .or_else(|| self.read_json::<TokenPair>(AUTH_TOKENS_KEY).map(|p| p.access_token))
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.non_empty(REFRESH_TOKEN_KEY)
            .or_else(|| self.read_json::<TokenPair>(AUTH_TOKENS_KEY).map(|p| p.refresh_token))
    }

    pub fn user(&self) -> Option<User> {
        self.read_json(USER_KEY)
    }

    pub fn set_user(&self, user: &User) {
        self.write_json(USER_KEY, user);
    }

    /// A user and an access token are both present.
    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some() && self.user().is_some()
    }

    /// Remove tokens and user.
    pub fn clear(&self) {
        if let Err(e) = self.storage.clear() {
            warn!(error = %e, "Failed to clear stored session");
        }
        debug!("Token store cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryStorage;

    fn user() -> User {
        serde_json::from_value(serde_json::json!({
            "id": 1, "email": "ana@example.com", "username": "ana",
            "first_name": "Ana", "last_name": "Diallo", "is_active": true,
            "created_at": "2025-01-01", "last_login": null
        }))
        .unwrap()
    }

    fn store() -> (Arc<MemoryStorage>, TokenStore) {
        let storage = Arc::new(MemoryStorage::new());
        (storage.clone(), TokenStore::new(storage))
    }

    #[test]
    fn test_set_tokens_writes_every_key() {
        let (storage, store) = store();
        store.set_tokens(&TokenPair::new("a1", "r1"));
        assert_eq!(storage.get(ACCESS_TOKEN_KEY).as_deref(), Some("a1"));
        assert_eq!(storage.get(REFRESH_TOKEN_KEY).as_deref(), Some("r1"));
        assert!(storage.get(AUTH_TOKENS_KEY).unwrap().contains("\"refresh_token\":\"r1\""));
        assert_eq!(store.tokens(), Some(TokenPair::new("a1", "r1")));
    }

    #[test]
    fn test_set_access_token_keeps_refresh() {
        let (_, store) = store();
        store.set_tokens(&TokenPair::new("a1", "r1"));
        store.set_access_token("a2");
        assert_eq!(store.tokens(), Some(TokenPair::new("a2", "r1")));
        assert_eq!(store.access_token().as_deref(), Some("a2"));
    }

    #[test]
    fn test_malformed_values_read_as_absent() {
        let (storage, store) = store();
        storage.set(USER_KEY, "{\"id\": \"oops\"").unwrap();
        storage.set(AUTH_TOKENS_KEY, "not json").unwrap();
        assert!(store.user().is_none());
        assert!(store.tokens().is_none());
    }

    #[test]
    fn test_tokens_fall_back_to_individual_keys() {
        let (storage, store) = store();
        storage.set(ACCESS_TOKEN_KEY, "a1").unwrap();
        assert!(store.tokens().is_none());
        storage.set(REFRESH_TOKEN_KEY, "r1").unwrap();
        assert_eq!(store.tokens(), Some(TokenPair::new("a1", "r1")));
    }

    #[test]
    fn test_clear_removes_user_and_tokens() {
        let (storage, store) = store();
        store.set_tokens(&TokenPair::new("a1", "r1"));
        store.set_user(&user());
        assert!(store.is_authenticated());

        store.clear();
        assert!(!store.is_authenticated());
        for key in STORAGE_KEYS {
            assert!(storage.get(key).is_none(), "{key} should be cleared");
        }
    }

    #[test]
    fn test_clear_deletes_session_file() {
        let path = crate::auth::storage::test_support::temp_path("session.json");
        let store = TokenStore::new(Arc::new(crate::auth::FileStorage::open(&path)));
        store.set_tokens(&TokenPair::new("a1", "r1"));
        assert!(path.exists());

        store.clear();
        assert!(!path.exists());
        assert!(store.tokens().is_none());
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let rendered = format!("{:?}", TokenPair::new("secret-a", "secret-r"));
        assert!(!rendered.contains("secret"));
    }
}
