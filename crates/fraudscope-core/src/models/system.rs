use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Response of `GET /`: service banner and endpoint documentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationResponse {
    pub status: String,
    pub message: String,
    pub version: String,
    /// Endpoint descriptions grouped by area (health, transactions, ...).
    #[serde(default)]
    pub documentation: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceModelStatus {
    pub loaded: bool,
    /// `ready` or `not loaded`.
    pub status: String,
}

impl ServiceModelStatus {
    pub fn is_ready(&self) -> bool {
        self.status == "ready"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthApi {
    pub environment: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub exists: bool,
    pub path: String,
    pub size_bytes: u64,
    pub size_mb: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthDatabase {
    pub status: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthModels {
    pub fraud_detection: ServiceModelStatus,
    pub image_classification: ServiceModelStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` or `unhealthy`.
    pub status: String,
    #[serde(default)]
    pub api: HealthApi,
    #[serde(default)]
    pub database: HealthDatabase,
    #[serde(default)]
    pub models: HealthModels,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FraudModelPaths {
    pub model: String,
    pub scaler: String,
    pub stats: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FraudModelInfo {
    pub loaded: bool,
    #[serde(default)]
    pub model_type: Option<String>,
    #[serde(default)]
    pub has_scaler: bool,
    #[serde(default)]
    pub has_train_stats: bool,
    #[serde(default)]
    pub paths: Option<FraudModelPaths>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebugImageModelInfo {
    pub loaded: bool,
    #[serde(default)]
    pub exists: bool,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Response of `GET /debug/model-status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugModelStatusResponse {
    pub base_directory: String,
    pub working_directory: String,
    pub ml_directory_exists: bool,
    #[serde(default)]
    pub ml_files: Vec<String>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    pub fraud_model: FraudModelInfo,
    pub image_model: DebugImageModelInfo,
}
