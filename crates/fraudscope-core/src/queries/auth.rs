//! Session lifecycle: register, login, logout, refresh, password change.
//!
//! Login and logout clear the whole query cache so nothing fetched for one
//! user is ever served to another.

use tracing::{info, warn};

use crate::api::{ApiClient, ApiError, ApiRequest, ApiResult};
use crate::auth::{TokenPair, TokenStore};
use crate::cache::QueryCache;
use crate::models::{
    ChangePasswordRequest, LoginRequest, LoginResponse, MessageResponse, RegisterRequest,
    RegisterResponse, User,
};

#[derive(Clone)]
pub struct Auth {
    api: ApiClient,
    cache: QueryCache,
}

impl Auth {
    pub fn new(api: ApiClient, cache: QueryCache) -> Self {
        Self { api, cache }
    }

    fn tokens(&self) -> &TokenStore {
        self.api.tokens()
    }

    /// `POST /auth/register`. Does not sign the new user in.
    pub async fn register(&self, data: &RegisterRequest) -> ApiResult<RegisterResponse> {
        if data.email.trim().is_empty() || data.password.is_empty() {
            return Err(ApiError::InvalidRequest(
                "Email and password are required".to_string(),
            ));
        }
        let request = ApiRequest::post("/auth/register").unauthenticated().json(data)?;
        let response: RegisterResponse = self.api.send_json(request).await?;
        info!(user_id = response.data.id, "Account registered");
        Ok(response)
    }

    /// `POST /auth/login`. Stores the token pair and user on success.
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<LoginResponse> {
        let credentials = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        if credentials.email.is_empty() || credentials.password.is_empty() {
            return Err(ApiError::InvalidRequest(
                "Email and password are required".to_string(),
            ));
        }

        let request = ApiRequest::post("/auth/login")
            .unauthenticated()
            .json(&credentials)?;
        let response: LoginResponse = self.api.send_json(request).await?;

        if response.data.access_token.is_empty() {
            return Err(ApiError::InvalidResponse(
                "Login response carried no access token".to_string(),
            ));
        }

        self.cache.clear();
        self.tokens().set_tokens(&TokenPair::new(
            response.data.access_token.clone(),
            response.data.refresh_token.clone(),
        ));
        self.tokens().set_user(&response.data.user);
        info!(user_id = response.data.user.id, "Logged in");
        Ok(response)
    }

    /// `POST /auth/logout`. Local credentials and cache are cleared even
    /// when the server call fails; the server error is still returned.
    pub async fn logout(&self) -> ApiResult<MessageResponse> {
        let result = if self.tokens().access_token().is_some() {
            self.api
                .send_json::<MessageResponse>(ApiRequest::post("/auth/logout"))
                .await
        } else {
            Ok(MessageResponse::default())
        };

        if let Err(e) = &result {
            warn!(error = %e, "Server logout failed, clearing local session anyway");
        }
        self.tokens().clear();
        self.cache.clear();
        info!("Logged out");
        result
    }

    /// Exchange the refresh token for a new access token on demand.
    ///
    /// Unlike the automatic refresh on 401, a failure here leaves the stored
    /// credentials untouched.
    pub async fn refresh(&self) -> ApiResult<String> {
        let refresh_token = self
            .tokens()
            .refresh_token()
            .ok_or(ApiError::NotAuthenticated)?;
        let access_token = self.api.exchange_refresh_token(&refresh_token).await?;
        self.tokens().set_access_token(&access_token);
        info!("Access token refreshed on request");
        Ok(access_token)
    }

    /// `POST /auth/change-password`
    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> ApiResult<MessageResponse> {
        if new_password.is_empty() {
            return Err(ApiError::InvalidRequest("New password is required".to_string()));
        }
        if current_password == new_password {
            return Err(ApiError::InvalidRequest(
                "New password must differ from the current one".to_string(),
            ));
        }
        let request = ApiRequest::post("/auth/change-password").json(&ChangePasswordRequest {
            current_password: current_password.to_string(),
            new_password: new_password.to_string(),
        })?;
        self.api.send_json(request).await
    }

    /// The stored user, without a network call.
    pub fn current_user(&self) -> Option<User> {
        self.tokens().user()
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens().is_authenticated()
    }
}
