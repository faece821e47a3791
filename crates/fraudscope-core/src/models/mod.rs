//! Wire types for the fraud-detection backend.
//!
//! This module contains the request and response shapes used by the
//! domain query modules:
//!
//! - `User` and the authentication payloads
//! - `Transaction`, pagination and statistics
//! - Fraud model predictions and risk analysis
//! - Image classifier status and predictions
//! - System health and API presentation

pub mod image;
pub mod prediction;
pub mod system;
pub mod transaction;
pub mod user;

pub use image::{
    BatchImageResponse, BatchImageResult, ImageModelInfo, ImageModelStatusResponse,
    ImagePredictResponse, ImagePredictionResult, ImageReloadRequest, ImageReloadResponse,
    DEFAULT_IMAGE_MODEL_PATH, DEFAULT_THRESHOLD,
};
pub use prediction::{
    BatchPredictionRequest, BatchPredictionResponse, BatchPredictionResult,
    ExplainTransactionResponse, ModelStatus, ModelStatusResponse, PredictExistingResponse,
    PredictPendingResponse, PredictTransactionRequest, PredictTransactionResponse,
    PredictionProbability, PredictionResult, ReloadModelRequest, ReloadModelResponse,
    RiskAnalysis, RiskFactor, RiskLevel, StoredPrediction,
};
pub use system::{
    DebugModelStatusResponse, HealthResponse, PresentationResponse, ServiceModelStatus,
};
pub use transaction::{
    AccountTransactionsResponse, CreateTransactionRequest, DeleteResponse, MarkFraudRequest,
    Pagination, PaginationParams, SearchParams, SearchResponse, Transaction, TransactionResponse,
    TransactionStats, TransactionStatsResponse, TransactionsPage, UpdateTransactionRequest,
};
pub use user::{
    ChangePasswordRequest, LoginData, LoginRequest, LoginResponse, MessageResponse,
    ProfileResponse, RefreshData, RefreshResponse, RegisterRequest, RegisterResponse,
    UpdateProfileRequest, User,
};
