//! REST API client module for the fraud-detection backend.
//!
//! This module provides the `ApiClient` used by every domain query module,
//! the replayable `ApiRequest` description, and the `ApiError` taxonomy.
//!
//! Authenticated calls carry `Authorization: Bearer <access_token>`. A 401
//! triggers one refresh through `/auth/refresh` and one replay.

pub mod client;
pub mod error;
pub mod request;

pub use client::{ApiClient, SessionExpiredHook, DEFAULT_BASE_URL, REQUEST_TIMEOUT_SECS};
pub use error::{ApiError, ApiResult};
pub use request::{ApiRequest, Attempt, FormPart, RequestBody};
