use serde::{Deserialize, Serialize};

use super::transaction::{CreateTransactionRequest, Transaction};

/// Raw prediction input has the same shape as a new transaction.
pub type PredictTransactionRequest = CreateTransactionRequest;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct PredictionProbability {
    pub fraud: f64,
    pub legitimate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct PredictionResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub prediction: i64,
    pub is_fraud: bool,
    /// `FRAUDE` or `LÉGITIME` as labelled by the backend.
    pub label: String,
    pub probability: PredictionProbability,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub factor: String,
    pub value: serde_json::Value,
    pub risk: RiskLevel,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAnalysis {
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub factors_count: u32,
    #[serde(default)]
    pub risk_factors: Vec<RiskFactor>,
    pub recommendation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub loaded: bool,
    #[serde(default)]
    pub model_type: Option<String>,
    #[serde(default)]
    pub has_scaler: Option<bool>,
    #[serde(default)]
    pub has_train_stats: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatusResponse {
    #[serde(default)]
    pub success: bool,
    pub model: ModelStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReloadModelRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scaler_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReloadModelResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub model: ModelStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictTransactionResponse {
    #[serde(default)]
    pub success: bool,
    pub data: PredictionResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainTransactionResponse {
    #[serde(default)]
    pub success: bool,
    pub prediction: PredictionResult,
    pub analysis: RiskAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPredictionRequest {
    pub transactions: Vec<PredictTransactionRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPredictionResult {
    pub index: usize,
    #[serde(flatten)]
    pub result: PredictionResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPredictionResponse {
    #[serde(default)]
    pub success: bool,
    pub total: u64,
    pub fraud_detected: u64,
    pub legitimate: u64,
    pub fraud_rate: f64,
    #[serde(default)]
    pub predictions: Vec<BatchPredictionResult>,
}

/// Prediction summary attached to a stored transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPrediction {
    pub is_fraud: bool,
    pub label: String,
    pub probability: PredictionProbability,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictExistingResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub prediction: StoredPrediction,
    /// Partial transaction as echoed by the backend.
    #[serde(default)]
    pub transaction: serde_json::Value,
}

impl PredictExistingResponse {
    /// The echoed transaction, when the backend sent a complete record.
    pub fn full_transaction(&self) -> Option<Transaction> {
        serde_json::from_value(self.transaction.clone()).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictPendingResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub processed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explain_response_parses_risk_levels() {
        let json = serde_json::json!({
            "success": true,
            "prediction": {
                "success": true, "prediction": 1, "is_fraud": true, "label": "FRAUDE",
                "probability": {"fraud": 0.91, "legitimate": 0.09}, "confidence": 0.91
            },
            "analysis": {
                "risk_score": 72.5, "risk_level": "HIGH", "factors_count": 1,
                "risk_factors": [{
                    "factor": "transaction_amount", "value": 9800,
                    "risk": "HIGH", "description": "Amount far above average"
                }],
                "recommendation": "Block and review"
            }
        });
        let parsed: ExplainTransactionResponse = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.analysis.risk_level, RiskLevel::High);
        assert_eq!(parsed.analysis.risk_factors[0].value, serde_json::json!(9800));
        assert!(parsed.prediction.is_fraud);
    }

    #[test]
    fn test_batch_result_flattens_prediction() {
        let json = serde_json::json!({
            "success": true, "total": 1, "fraud_detected": 0, "legitimate": 1, "fraud_rate": 0.0,
            "predictions": [{
                "index": 0, "success": true, "prediction": 0, "is_fraud": false,
                "label": "LÉGITIME", "probability": {"fraud": 0.1, "legitimate": 0.9},
                "confidence": 0.9
            }]
        });
        let parsed: BatchPredictionResponse = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.predictions[0].index, 0);
        assert_eq!(parsed.predictions[0].result.label, "LÉGITIME");
    }

    #[test]
    fn test_partial_transaction_is_not_full() {
        let json = serde_json::json!({
            "success": true,
            "message": "done",
            "prediction": {
                "is_fraud": false, "label": "LÉGITIME",
                "probability": {"fraud": 0.2, "legitimate": 0.8}, "confidence": 0.8
            },
            "transaction": {"id": 3, "prediction": 0}
        });
        let parsed: PredictExistingResponse = serde_json::from_value(json).unwrap();
        assert!(parsed.full_transaction().is_none());
    }
}
