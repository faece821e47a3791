//! Fraudscope core library.
//!
//! Client-side data layer for the fraud-detection and image-classification
//! dashboard backend:
//!
//! - `auth`: durable credential storage and the token store
//! - `api`: HTTP client with bearer injection and refresh-on-401
//! - `cache`: key-addressed query cache with staleness and invalidation
//! - `queries`: per-domain reads and mutations
//! - `context`: the explicitly constructed `AppContext` tying them together

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod context;
pub mod models;
pub mod queries;

pub use api::{ApiClient, ApiError, ApiResult};
pub use cache::{QueryCache, QueryKey, StalePolicy};
pub use config::Config;
pub use context::AppContext;
