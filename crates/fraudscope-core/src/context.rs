//! The application context: one token store, one API client and one query
//! cache, built explicitly and handed to whatever needs them.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api::ApiClient;
use crate::auth::{Storage, TokenStore};
use crate::cache::{spawn_gc_task, QueryCache};
use crate::config::Config;
use crate::queries::{Auth, ImagePredictions, Predictions, Profile, System, Transactions};

/// How often idle cache entries are swept.
const GC_INTERVAL_SECS: u64 = 60;

#[derive(Clone)]
pub struct AppContext {
    api: ApiClient,
    cache: QueryCache,
}

impl AppContext {
    /// Build a context from configuration, hydrating credentials from the
    /// configured storage.
    pub fn init(config: &Config) -> Result<Self> {
        let storage = config.open_storage()?;
        Self::with_storage(&config.base_url, config.timeout(), storage)
    }

    /// Build a context over an explicit storage backend.
    pub fn with_storage(
        base_url: &str,
        timeout: Duration,
        storage: Arc<dyn Storage>,
    ) -> Result<Self> {
        let tokens = TokenStore::new(storage);
        let cache = QueryCache::new();

        // A failed refresh signs the user out; nothing cached for them may
        // outlive that.
        let expired_cache = cache.clone();
        let api = ApiClient::new(base_url, timeout, tokens)
            .context("Failed to build HTTP client")?
            .with_session_expired_hook(Arc::new(move || {
                debug!("Session expired, clearing query cache");
                expired_cache.clear();
            }));

        info!(
            base_url = %api.base_url(),
            authenticated = api.tokens().is_authenticated(),
            "Application context ready"
        );
        Ok(Self { api, cache })
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn tokens(&self) -> &TokenStore {
        self.api.tokens()
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn auth(&self) -> Auth {
        Auth::new(self.api.clone(), self.cache.clone())
    }

    pub fn transactions(&self) -> Transactions {
        Transactions::new(self.api.clone(), self.cache.clone())
    }

    pub fn predictions(&self) -> Predictions {
        Predictions::new(self.api.clone(), self.cache.clone())
    }

    pub fn image_predictions(&self) -> ImagePredictions {
        ImagePredictions::new(self.api.clone(), self.cache.clone())
    }

    pub fn profile(&self) -> Profile {
        Profile::new(self.api.clone(), self.cache.clone())
    }

    pub fn system(&self) -> System {
        System::new(self.api.clone(), self.cache.clone())
    }

    /// Start sweeping idle cache entries.
    pub fn spawn_cache_gc(&self) -> JoinHandle<()> {
        spawn_gc_task(self.cache.clone(), Duration::from_secs(GC_INTERVAL_SECS))
    }

    /// Forget the local session: credentials and every cached query.
    pub fn teardown(&self) {
        self.tokens().clear();
        self.cache.clear();
        info!("Local session cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemoryStorage, TokenPair};
    use crate::cache::QueryKey;

    #[test]
    fn test_hydrates_existing_session() {
        let storage = Arc::new(MemoryStorage::new());
        TokenStore::new(storage.clone()).set_tokens(&TokenPair::new("a", "r"));

        let ctx = AppContext::with_storage("http://localhost", Duration::from_secs(5), storage)
            .unwrap();
        assert_eq!(ctx.tokens().access_token().as_deref(), Some("a"));
    }

    #[test]
    fn test_teardown_clears_tokens_and_cache() {
        let ctx = AppContext::with_storage(
            "http://localhost",
            Duration::from_secs(5),
            Arc::new(MemoryStorage::new()),
        )
        .unwrap();
        ctx.tokens().set_tokens(&TokenPair::new("a", "r"));
        ctx.cache().set_query_data(&QueryKey::root("profile"), &1u32).unwrap();

        ctx.teardown();
        assert!(ctx.tokens().tokens().is_none());
        assert!(ctx.cache().is_empty());
    }
}
