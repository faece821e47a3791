//! Fraud model status, reload and inference.

use tracing::info;

use super::edges::Mutation;
use crate::api::{ApiClient, ApiError, ApiRequest, ApiResult};
use crate::cache::{QueryCache, StalePolicy};
use crate::models::{
    BatchPredictionRequest, BatchPredictionResponse, ExplainTransactionResponse,
    ModelStatusResponse, PredictExistingResponse, PredictPendingResponse,
    PredictTransactionRequest, PredictTransactionResponse, ReloadModelRequest,
    ReloadModelResponse,
};

pub mod keys {
    use crate::cache::QueryKey;

    pub fn all() -> QueryKey {
        QueryKey::root("predictions")
    }

    pub fn status() -> QueryKey {
        all().child("status")
    }
}

#[derive(Clone)]
pub struct Predictions {
    api: ApiClient,
    cache: QueryCache,
}

impl Predictions {
    pub fn new(api: ApiClient, cache: QueryCache) -> Self {
        Self { api, cache }
    }

    /// `GET /predict/status`
    pub async fn status(&self) -> ApiResult<ModelStatusResponse> {
        self.cache
            .query(keys::status(), StalePolicy::FRAUD_MODEL_STATUS, || {
                self.api.send_json(ApiRequest::get("/predict/status"))
            })
            .await
    }

    /// `POST /predict/reload`. Empty paths keep the backend's defaults.
    pub async fn reload(&self, paths: &ReloadModelRequest) -> ApiResult<ReloadModelResponse> {
        let request = ApiRequest::post("/predict/reload").json(paths)?;
        let response: ReloadModelResponse = self.api.send_json(request).await?;
        info!(loaded = response.model.loaded, "Fraud model reloaded");
        self.cache.apply_mutation(&Mutation::ReloadFraudModel);
        Ok(response)
    }

    /// `POST /predict/transaction`. Nothing is stored server-side.
    pub async fn predict(
        &self,
        features: &PredictTransactionRequest,
    ) -> ApiResult<PredictTransactionResponse> {
        features.validate().map_err(ApiError::InvalidRequest)?;
        let request = ApiRequest::post("/predict/transaction").json(features)?;
        self.api.send_json(request).await
    }

    /// `POST /predict/transaction/explain`
    pub async fn explain(
        &self,
        features: &PredictTransactionRequest,
    ) -> ApiResult<ExplainTransactionResponse> {
        features.validate().map_err(ApiError::InvalidRequest)?;
        let request = ApiRequest::post("/predict/transaction/explain").json(features)?;
        self.api.send_json(request).await
    }

    /// `POST /predict/batch`
    pub async fn batch(&self, batch: &BatchPredictionRequest) -> ApiResult<BatchPredictionResponse> {
        if batch.transactions.is_empty() {
            return Err(ApiError::InvalidRequest(
                "Batch prediction needs at least one transaction".to_string(),
            ));
        }
        let request = ApiRequest::post("/predict/batch").json(batch)?;
        self.api.send_json(request).await
    }

    /// `POST /predict/transaction/{id}`: predict and store the result on an
    /// existing transaction.
    pub async fn predict_existing(&self, id: i64) -> ApiResult<PredictExistingResponse> {
        let response: PredictExistingResponse = self
            .api
            .send_json(ApiRequest::post(format!("/predict/transaction/{}", id)))
            .await?;
        self.cache.apply_mutation(&Mutation::PredictExisting { id });
        Ok(response)
    }

    /// `POST /predict/transactions/pending`: predict every transaction
    /// without a stored prediction.
    pub async fn predict_pending(&self) -> ApiResult<PredictPendingResponse> {
        let response: PredictPendingResponse = self
            .api
            .send_json(ApiRequest::post("/predict/transactions/pending"))
            .await?;
        info!(processed = response.processed, "Pending transactions predicted");
        self.cache.apply_mutation(&Mutation::PredictAllPending);
        Ok(response)
    }
}
