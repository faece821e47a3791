//! Service banner, health and model diagnostics.

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::api::{ApiClient, ApiRequest, ApiResult};
use crate::cache::{spawn_polling, QueryCache, StalePolicy};
use crate::models::{DebugModelStatusResponse, HealthResponse, PresentationResponse};

pub mod keys {
    use crate::cache::QueryKey;

    pub fn all() -> QueryKey {
        QueryKey::root("system")
    }

    pub fn presentation() -> QueryKey {
        all().child("presentation")
    }

    pub fn health() -> QueryKey {
        all().child("health")
    }

    pub fn model_status() -> QueryKey {
        all().child("model-status")
    }
}

/// Readiness derived from whatever health and model data is cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Readiness {
    pub healthy: bool,
    pub fraud_model_loaded: bool,
    pub image_model_loaded: bool,
    pub fraud_model_ready: bool,
    pub image_model_ready: bool,
}

impl Readiness {
    pub fn from_parts(
        health: Option<&HealthResponse>,
        models: Option<&DebugModelStatusResponse>,
    ) -> Self {
        Self {
            healthy: health.map(HealthResponse::is_healthy).unwrap_or(false),
            fraud_model_loaded: models.map(|m| m.fraud_model.loaded).unwrap_or(false),
            image_model_loaded: models.map(|m| m.image_model.loaded).unwrap_or(false),
            fraud_model_ready: health
                .map(|h| h.models.fraud_detection.is_ready())
                .unwrap_or(false),
            image_model_ready: health
                .map(|h| h.models.image_classification.is_ready())
                .unwrap_or(false),
        }
    }
}

#[derive(Clone)]
pub struct System {
    api: ApiClient,
    cache: QueryCache,
}

impl System {
    pub fn new(api: ApiClient, cache: QueryCache) -> Self {
        Self { api, cache }
    }

    /// `GET /`
    pub async fn presentation(&self) -> ApiResult<PresentationResponse> {
        self.cache
            .query(keys::presentation(), StalePolicy::PRESENTATION, || {
                self.api.send_json(ApiRequest::get("/"))
            })
            .await
    }

    /// `GET /health`
    pub async fn health(&self) -> ApiResult<HealthResponse> {
        self.cache
            .query(keys::health(), StalePolicy::HEALTH, || {
                self.api.send_json(ApiRequest::get("/health"))
            })
            .await
    }

    /// `GET /debug/model-status`
    pub async fn model_status(&self) -> ApiResult<DebugModelStatusResponse> {
        self.cache
            .query(keys::model_status(), StalePolicy::DEBUG_MODEL_STATUS, || {
                self.api.send_json(ApiRequest::get("/debug/model-status"))
            })
            .await
    }

    /// Poll `/health` every 30 seconds until the handle is aborted.
    pub fn watch_health(&self) -> JoinHandle<()> {
        let api = self.api.clone();
        spawn_polling(
            self.cache.clone(),
            keys::health(),
            StalePolicy::HEALTH,
            StalePolicy::HEALTH.stale_time,
            move || {
                let api = api.clone();
                async move { api.send_json::<HealthResponse>(ApiRequest::get("/health")).await }
            },
        )
    }

    /// Readiness from cached data only.
    pub fn readiness(&self) -> Readiness {
        let health = self
            .cache
            .peek::<HealthResponse>(&keys::health())
            .and_then(|s| s.data);
        let models = self
            .cache
            .peek::<DebugModelStatusResponse>(&keys::model_status())
            .and_then(|s| s.data);
        Readiness::from_parts(health.as_ref(), models.as_ref())
    }

    /// How long ago the cached health check was fetched, e.g. "3m ago".
    pub fn health_checked(&self) -> String {
        self.cache
            .peek::<HealthResponse>(&keys::health())
            .map(|s| s.age_display())
            .unwrap_or_else(|| "never".to_string())
    }
}
