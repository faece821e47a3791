//! The signed-in user's profile.

use tracing::debug;

use super::edges::Mutation;
use crate::api::{ApiClient, ApiError, ApiRequest, ApiResult};
use crate::cache::{QueryCache, StalePolicy};
use crate::models::{ProfileResponse, UpdateProfileRequest};

pub mod keys {
    use crate::cache::QueryKey;

    pub fn all() -> QueryKey {
        QueryKey::root("profile")
    }

    pub fn detail() -> QueryKey {
        all().child("detail")
    }
}

#[derive(Clone)]
pub struct Profile {
    api: ApiClient,
    cache: QueryCache,
}

impl Profile {
    pub fn new(api: ApiClient, cache: QueryCache) -> Self {
        Self { api, cache }
    }

    /// `GET /auth/me`
    pub async fn get(&self) -> ApiResult<ProfileResponse> {
        self.cache
            .query(keys::detail(), StalePolicy::PROFILE, || {
                self.api.send_json(ApiRequest::get("/auth/me"))
            })
            .await
    }

    /// `PUT /auth/me`. The returned user replaces the cached profile and the
    /// stored user record.
    pub async fn update(&self, changes: &UpdateProfileRequest) -> ApiResult<ProfileResponse> {
        if changes.is_empty() {
            return Err(ApiError::InvalidRequest("Nothing to update".to_string()));
        }
        let request = ApiRequest::put("/auth/me").json(changes)?;
        let response: ProfileResponse = self.api.send_json(request).await?;

        self.cache.set_query_data(
            &keys::detail(),
            &ProfileResponse {
                success: true,
                message: None,
                data: response.data.clone(),
            },
        )?;
        self.cache.apply_mutation(&Mutation::UpdateProfile);

        // A user record is only kept alongside a token pair.
        let tokens = self.api.tokens();
        if tokens.tokens().is_some() {
            tokens.set_user(&response.data);
        }
        debug!(user_id = response.data.id, "Profile updated");
        Ok(response)
    }
}
