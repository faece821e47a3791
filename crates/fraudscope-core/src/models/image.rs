use serde::{Deserialize, Serialize};

/// Default classifier weights path understood by the backend.
pub const DEFAULT_IMAGE_MODEL_PATH: &str = "./ml/imageclassifier.h5";

/// Decision threshold the backend applies when none is sent.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageModelInfo {
    pub loaded: bool,
    #[serde(default)]
    pub model_type: Option<String>,
    #[serde(default)]
    pub input_shape: Option<String>,
    #[serde(default)]
    pub output_shape: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageModelStatusResponse {
    #[serde(default)]
    pub success: bool,
    pub model: ImageModelInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageReloadRequest {
    pub model_path: String,
}

impl Default for ImageReloadRequest {
    fn default() -> Self {
        Self {
            model_path: DEFAULT_IMAGE_MODEL_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageReloadResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub model: ImageModelInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePredictionResult {
    #[serde(default)]
    pub success: bool,
    pub prediction: i64,
    #[serde(rename = "class")]
    pub class_name: String,
    pub confidence: f64,
    pub threshold: f64,
    /// Per-class probabilities keyed by class name.
    #[serde(default)]
    pub probabilities: std::collections::BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePredictResponse {
    #[serde(default)]
    pub success: bool,
    pub data: ImagePredictionResult,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchImageResult {
    pub index: usize,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(flatten)]
    pub result: ImagePredictionResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchImageResponse {
    #[serde(default)]
    pub success: bool,
    pub total: u64,
    #[serde(default)]
    pub sad_count: u64,
    #[serde(default)]
    pub happy_count: u64,
    #[serde(default)]
    pub predictions: Vec<BatchImageResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_prediction_reads_class_field() {
        let json = serde_json::json!({
            "success": true,
            "data": {
                "success": true, "prediction": 1, "class": "parasited",
                "confidence": 0.87, "threshold": 0.5,
                "probabilities": {"happy": 0.13, "sad": 0.87}
            },
            "filename": "cell_01.png",
            "file_size": 20480
        });
        let parsed: ImagePredictResponse = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.data.class_name, "parasited");
        assert_eq!(parsed.data.probabilities.get("sad"), Some(&0.87));
        assert_eq!(parsed.file_size, Some(20480));
    }

    #[test]
    fn test_reload_request_defaults_to_bundled_model() {
        assert_eq!(ImageReloadRequest::default().model_path, DEFAULT_IMAGE_MODEL_PATH);
    }
}
