use serde::{Deserialize, Serialize};

/// Model input features of a card transaction.
///
/// Shared by transaction creation and raw fraud predictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct CreateTransactionRequest {
    pub gender: i64,
    pub age: i64,
    pub house_type_id: i64,
    /// Field name as spelled by the backend.
    pub contact_avaliability_id: i64,
    pub home_country: i64,
    pub account_no: i64,
    pub card_expiry_date: i64,
    pub cif: i64,
    pub transaction_amount: f64,
    pub transaction_country: i64,
    pub transaction_currency_code: i64,
    pub large_purchase: i64,
    pub product_id: i64,
}

impl CreateTransactionRequest {
    /// Client-side checks run before anything reaches the network.
    pub fn validate(&self) -> Result<(), String> {
        if self.age <= 0 || self.age > 120 {
            return Err(format!("Age must be between 1 and 120, got {}", self.age));
        }
        if !self.transaction_amount.is_finite() || self.transaction_amount < 0.0 {
            return Err("Transaction amount must be a positive number".to_string());
        }
        if self.account_no <= 0 {
            return Err("Account number is required".to_string());
        }
        if !(0..=1).contains(&self.large_purchase) {
            return Err("Large purchase must be 0 or 1".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    #[serde(flatten)]
    pub features: CreateTransactionRequest,
    #[serde(default)]
    pub potential_fraud: i64,
    pub prediction: Option<i64>,
    pub prediction_proba: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
}

impl Transaction {
    pub fn is_flagged(&self) -> bool {
        self.potential_fraud == 1 || self.prediction == Some(1)
    }

    pub fn is_predicted(&self) -> bool {
        self.prediction.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateTransactionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub house_type_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_avaliability_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_country: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_no: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_expiry_date: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cif: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_country: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_currency_code: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub large_purchase: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<i64>,
}

/// `page` / `per_page` query parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaginationParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
}

impl PaginationParams {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct Pagination {
    pub page: u32,
    pub pages: u32,
    pub per_page: u32,
    pub total: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

/// A page of transactions with its pagination metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionsPage {
    #[serde(default)]
    pub success: bool,
    pub data: Vec<Transaction>,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionResponse {
    #[serde(default)]
    pub success: bool,
    pub data: Transaction,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct TransactionStats {
    pub total_transactions: u64,
    pub total_amount: f64,
    pub average_amount: f64,
    pub max_amount: f64,
    pub fraudulent: u64,
    pub legitimate: u64,
    pub fraud_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionStatsResponse {
    #[serde(default)]
    pub success: bool,
    pub stats: TransactionStats,
}

/// Amount-range search with paging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<f64>,
    #[serde(flatten)]
    pub paging: PaginationParams,
}

impl SearchParams {
    /// A search needs at least one bound before it is worth sending.
    pub fn has_bounds(&self) -> bool {
        self.min_amount.is_some() || self.max_amount.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(flatten)]
    pub page: TransactionsPage,
    #[serde(default)]
    pub filters: SearchFilters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountTransactionsResponse {
    #[serde(flatten)]
    pub page: TransactionsPage,
    pub account_no: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkFraudRequest {
    pub is_fraud: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features() -> CreateTransactionRequest {
        CreateTransactionRequest {
            gender: 1,
            age: 34,
            house_type_id: 2,
            contact_avaliability_id: 1,
            home_country: 12,
            account_no: 99812,
            card_expiry_date: 1228,
            cif: 5512,
            transaction_amount: 249.9,
            transaction_country: 12,
            transaction_currency_code: 978,
            large_purchase: 0,
            product_id: 3,
        }
    }

    #[test]
    fn test_transaction_flattens_features() {
        let json = serde_json::json!({
            "id": 4, "user_id": 1,
            "gender": 1, "age": 34, "house_type_id": 2, "contact_avaliability_id": 1,
            "home_country": 12, "account_no": 99812, "card_expiry_date": 1228, "cif": 5512,
            "transaction_amount": 249.9, "transaction_country": 12,
            "transaction_currency_code": 978, "large_purchase": 0, "product_id": 3,
            "potential_fraud": 1, "prediction": null, "prediction_proba": null,
            "created_at": "2025-03-01", "updated_at": "2025-03-01"
        });
        let tx: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(tx.features, features());
        assert!(tx.is_flagged());
        assert!(!tx.is_predicted());
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        assert!(features().validate().is_ok());

        let mut bad = features();
        bad.age = 0;
        assert!(bad.validate().is_err());

        let mut bad = features();
        bad.transaction_amount = -1.0;
        assert!(bad.validate().is_err());

        let mut bad = features();
        bad.large_purchase = 3;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_search_params_bounds() {
        assert!(!SearchParams::default().has_bounds());
        let params = SearchParams {
            min_amount: Some(100.0),
            ..Default::default()
        };
        assert!(params.has_bounds());
        let json = serde_json::to_value(params).unwrap();
        assert_eq!(json, serde_json::json!({"min_amount": 100.0}));
    }

    #[test]
    fn test_pagination_defaults_when_missing() {
        let page: TransactionsPage =
            serde_json::from_str(r#"{"success": true, "data": [], "count": 0}"#).unwrap();
        assert_eq!(page.pagination, Pagination::default());
    }
}
