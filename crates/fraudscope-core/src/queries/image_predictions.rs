//! Image classifier status, reload and uploads.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use super::edges::Mutation;
use crate::api::{ApiClient, ApiError, ApiRequest, ApiResult, FormPart};
use crate::cache::{QueryCache, StalePolicy};
use crate::models::{
    BatchImageResponse, ImageModelStatusResponse, ImagePredictResponse, ImageReloadRequest,
    ImageReloadResponse, DEFAULT_THRESHOLD,
};

pub mod keys {
    use crate::cache::QueryKey;

    pub fn all() -> QueryKey {
        QueryKey::root("image-prediction")
    }

    pub fn status() -> QueryKey {
        all().child("status")
    }
}

/// An image to upload.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Read a local file, keeping only its file name for the upload.
    pub fn read(path: impl AsRef<Path>) -> ApiResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            ApiError::InvalidRequest(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        Ok(Self::new(file_name, bytes))
    }

    fn into_part(self, field: &str) -> FormPart {
        FormPart::file(field, self.file_name, self.bytes)
    }
}

#[derive(Serialize)]
struct PathPredictRequest<'a> {
    path: &'a str,
    threshold: f64,
}

fn check_threshold(threshold: f64) -> ApiResult<f64> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(ApiError::InvalidRequest(format!(
            "Threshold must be between 0 and 1, got {}",
            threshold
        )))
    }
}

/// Form for a single image. The threshold is only sent when it differs
/// from the backend default.
fn single_form(image: ImageFile, threshold: f64) -> Vec<FormPart> {
    let mut parts = vec![image.into_part("image")];
    if threshold != DEFAULT_THRESHOLD {
        parts.push(FormPart::text("threshold", threshold.to_string()));
    }
    parts
}

/// Form for a batch: one repeated `images` field, threshold always sent.
fn batch_form(images: Vec<ImageFile>, threshold: f64) -> Vec<FormPart> {
    let mut parts: Vec<FormPart> = images.into_iter().map(|i| i.into_part("images")).collect();
    parts.push(FormPart::text("threshold", threshold.to_string()));
    parts
}

#[derive(Clone)]
pub struct ImagePredictions {
    api: ApiClient,
    cache: QueryCache,
}

impl ImagePredictions {
    pub fn new(api: ApiClient, cache: QueryCache) -> Self {
        Self { api, cache }
    }

    /// `GET /predict/image/status`. Polled every 30 seconds while watched.
    pub async fn status(&self) -> ApiResult<ImageModelStatusResponse> {
        self.cache
            .query(keys::status(), StalePolicy::IMAGE_MODEL_STATUS, || {
                self.api.send_json(ApiRequest::get("/predict/image/status"))
            })
            .await
    }

    /// Keep the model status refreshed in the background.
    pub fn watch_status(&self) -> tokio::task::JoinHandle<()> {
        let api = self.api.clone();
        crate::cache::spawn_polling(
            self.cache.clone(),
            keys::status(),
            StalePolicy::IMAGE_MODEL_STATUS,
            StalePolicy::IMAGE_MODEL_STATUS.stale_time,
            move || {
                let api = api.clone();
                async move {
                    api.send_json::<ImageModelStatusResponse>(ApiRequest::get(
                        "/predict/image/status",
                    ))
                    .await
                }
            },
        )
    }

    /// `POST /predict/image/reload`. `None` reloads the default weights.
    pub async fn reload(&self, model_path: Option<&str>) -> ApiResult<ImageReloadResponse> {
        let body = match model_path {
            Some(path) => ImageReloadRequest {
                model_path: path.to_string(),
            },
            None => ImageReloadRequest::default(),
        };
        let request = ApiRequest::post("/predict/image/reload").json(&body)?;
        let response: ImageReloadResponse = self.api.send_json(request).await?;
        info!(path = %body.model_path, loaded = response.model.loaded, "Image model reloaded");
        self.cache.apply_mutation(&Mutation::ReloadImageModel);
        Ok(response)
    }

    /// `POST /predict/image/predict` with a multipart `image` field.
    pub async fn predict(
        &self,
        image: ImageFile,
        threshold: Option<f64>,
    ) -> ApiResult<ImagePredictResponse> {
        let threshold = check_threshold(threshold.unwrap_or(DEFAULT_THRESHOLD))?;
        debug!(file = %image.file_name, size = image.bytes.len(), "Uploading image");
        let request =
            ApiRequest::post("/predict/image/predict").multipart(single_form(image, threshold));
        self.api.send_json(request).await
    }

    /// `POST /predict/image/predict/batch` with repeated `images` fields.
    pub async fn batch(
        &self,
        images: Vec<ImageFile>,
        threshold: Option<f64>,
    ) -> ApiResult<BatchImageResponse> {
        if images.is_empty() {
            return Err(ApiError::InvalidRequest(
                "Batch prediction needs at least one image".to_string(),
            ));
        }
        let threshold = check_threshold(threshold.unwrap_or(DEFAULT_THRESHOLD))?;
        debug!(count = images.len(), "Uploading image batch");
        let request = ApiRequest::post("/predict/image/predict/batch")
            .multipart(batch_form(images, threshold));
        self.api.send_json(request).await
    }

    /// `POST /predict/image/predict/file`: classify a file already on the
    /// server.
    pub async fn predict_from_path(
        &self,
        path: &str,
        threshold: Option<f64>,
    ) -> ApiResult<ImagePredictResponse> {
        if path.trim().is_empty() {
            return Err(ApiError::InvalidRequest("Image path is required".to_string()));
        }
        let threshold = check_threshold(threshold.unwrap_or(DEFAULT_THRESHOLD))?;
        let request = ApiRequest::post("/predict/image/predict/file")
            .json(&PathPredictRequest { path, threshold })?;
        self.api.send_json(request).await
    }
}
