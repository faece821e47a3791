//! HTTP client for the fraud-detection backend.
//!
//! Every outbound call goes through `ApiClient::execute`, which attaches the
//! stored access token and, when the backend answers 401, exchanges the
//! refresh token for a new access token and replays the request once.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::request::{ApiRequest, Attempt, RequestBody};
use super::{ApiError, ApiResult};
use crate::auth::TokenStore;
use crate::models::RefreshResponse;

// ============================================================================
// Constants
// ============================================================================

/// Backend used when no configuration overrides it.
pub const DEFAULT_BASE_URL: &str = "https://machine-learning-dsgl-2025-backend.onrender.com/";

/// HTTP request timeout in seconds.
/// Inference on a cold backend instance can take well over a minute.
pub const REQUEST_TIMEOUT_SECS: u64 = 100;

const REFRESH_PATH: &str = "/auth/refresh";

/// Callback run after a failed refresh has cleared the stored credentials.
pub type SessionExpiredHook = Arc<dyn Fn() + Send + Sync>;

/// API client for the backend.
/// Clone is cheap - reqwest::Client and the token store are shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    tokens: TokenStore,
    /// Serializes refresh exchanges so concurrent 401s share one refresh.
    refresh_lock: Arc<Mutex<()>>,
    on_session_expired: Option<SessionExpiredHook>,
}

impl ApiClient {
    /// Create a client for `base_url` reading credentials from `tokens`.
    pub fn new(base_url: &str, timeout: Duration, tokens: TokenStore) -> ApiResult<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(ApiError::Network)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
            refresh_lock: Arc::new(Mutex::new(())),
            on_session_expired: None,
        })
    }

    /// Register a callback for when a failed refresh signs the user out.
    pub fn with_session_expired_hook(mut self, hook: SessionExpiredHook) -> Self {
        self.on_session_expired = Some(hook);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> ApiResult<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn send_once(&self, request: &ApiRequest, token: Option<&str>) -> ApiResult<Response> {
        let mut builder = self
            .client
            .request(request.method.clone(), self.url(&request.path));

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(parts) => builder.multipart(ApiRequest::build_form(parts)?),
        };

        let response = builder.send().await?;
        Self::check_response(response).await
    }

    /// Send a request, refreshing the access token and replaying once on 401.
    pub async fn execute(&self, request: ApiRequest) -> ApiResult<Response> {
        let mut attempt = Attempt::first(request);

        loop {
            let token = if attempt.request.authenticated {
                self.tokens.access_token()
            } else {
                None
            };

            debug!(
                method = %attempt.request.method,
                path = %attempt.request.path,
                attempt = attempt.attempt,
                authenticated = token.is_some(),
                "Sending request"
            );

            match self.send_once(&attempt.request, token.as_deref()).await {
                Err(err)
                    if err.is_unauthorized()
                        && attempt.request.authenticated
                        && !attempt.is_retry()
                        && self.tokens.refresh_token().is_some() =>
                {
                    debug!(path = %attempt.request.path, "Access token rejected, refreshing");
                    self.refresh_after_rejection(token.as_deref()).await?;
                    attempt = attempt.retried();
                }
                result => return result,
            }
        }
    }

    /// Send a request and parse the JSON response body.
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> ApiResult<T> {
        let path = request.path.clone();
        let response = self.execute(request).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", path, e))
        })
    }

    /// Exchange the stored refresh token after `rejected` got a 401.
    ///
    /// Waiters that find the stored access token already replaced reuse it.
    async fn refresh_after_rejection(&self, rejected: Option<&str>) -> ApiResult<()> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(current) = self.tokens.access_token() {
            if Some(current.as_str()) != rejected {
                debug!("Access token already refreshed by a concurrent request");
                return Ok(());
            }
        }

        let refresh_token = self
            .tokens
            .refresh_token()
            .ok_or(ApiError::NotAuthenticated)?;

        match self.exchange_refresh_token(&refresh_token).await {
            Ok(access_token) => {
                self.tokens.set_access_token(&access_token);
                info!("Access token refreshed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, clearing stored credentials");
                self.tokens.clear();
                if let Some(hook) = &self.on_session_expired {
                    hook();
                }
                Err(e)
            }
        }
    }

    /// `POST /auth/refresh` with the refresh token as bearer credential.
    pub async fn exchange_refresh_token(&self, refresh_token: &str) -> ApiResult<String> {
        let response = self
            .client
            .post(self.url(REFRESH_PATH))
            .bearer_auth(refresh_token)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let response = Self::check_response(response).await?;

        let text = response.text().await?;
        let parsed: RefreshResponse = serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse refresh response: {}", e))
        })?;

        if parsed.data.access_token.is_empty() {
            return Err(ApiError::InvalidResponse(
                "Refresh response carried an empty access token".to_string(),
            ));
        }
        Ok(parsed.data.access_token)
    }
}
