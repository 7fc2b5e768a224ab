//! services/api/src/web/users.rs
//!
//! Profile sync from the authentication provider.

use crate::error::{ApiError, ErrorBody};
use crate::web::{middleware::UserId, state::AppState};
use axum::{
    extract::State,
    response::Json,
    Extension,
};
use chrono::{DateTime, Utc};
use readwithme_core::domain::{User, UserProfile};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncUserRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub user_id: String,
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.profile.user_id,
            email: user.profile.email,
            username: user.profile.username,
            first_name: user.profile.first_name,
            last_name: user.profile.last_name,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Create or refresh the caller's profile.
#[utoipa::path(
    post,
    path = "/api/users/sync",
    request_body = SyncUserRequest,
    responses(
        (status = 200, description = "Profile stored", body = UserResponse),
        (status = 401, description = "Missing user id", body = ErrorBody)
    ),
    params(("x-user-id" = String, Header, description = "Verified user id from the auth layer.")),
    tag = "users"
)]
pub async fn sync_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Json(req): Json<SyncUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let profile = UserProfile {
        user_id,
        email: req.email,
        username: req.username,
        first_name: req.first_name,
        last_name: req.last_name,
    };
    let user = state.content.sync_user(profile).await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "The caller's profile", body = UserResponse),
        (status = 401, description = "Missing user id", body = ErrorBody),
        (status = 404, description = "Profile never synced", body = ErrorBody)
    ),
    params(("x-user-id" = String, Header, description = "Verified user id from the auth layer.")),
    tag = "users"
)]
pub async fn current_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.content.get_user(&user_id).await?;
    Ok(Json(user.into()))
}
