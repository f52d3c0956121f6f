//! Self-service profile

use axum::{
    Json, Router,
    extract::State,
    routing::{get, put},
};
use simaling_auth::{AnyRole, AuthError, Authorized, hash_password, verify_password};
use simaling_db::{UpdateProfile, User};
use tracing::info;

use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::state::AppState;

use super::types::{
    ChangePasswordRequest, DataResponse, MessageDataResponse, MessageResponse,
    UpdateProfileRequest, UserDetail,
};
use super::users::validate_password;

/// GET /api/profile
async fn get_profile(
    auth: Authorized<AnyRole>,
    State(state): State<AppState>,
) -> Result<Json<DataResponse<UserDetail>>, ApiError> {
    let family_members = state.db.list_family_members(auth.user.id).await?;
    Ok(Json(DataResponse {
        data: UserDetail {
            user: auth.user,
            family_members,
        },
    }))
}

/// PUT /api/profile
async fn update_profile(
    auth: Authorized<AnyRole>,
    State(state): State<AppState>,
    JsonBody(request): JsonBody<UpdateProfileRequest>,
) -> Result<Json<MessageDataResponse<User>>, ApiError> {
    let name = request.name.map(|n| n.trim().to_string());
    if name.as_deref() == Some("") {
        return Err(ApiError::bad_request("Name cannot be empty"));
    }

    let user = state
        .db
        .update_profile(
            auth.user.id,
            UpdateProfile {
                name,
                address: request.address.map(|a| a.trim().to_string()),
                email: request.email.map(|e| e.trim().to_string()),
            },
        )
        .await?
        .ok_or(AuthError::MissingIdentity)?;

    info!("User {} updated their profile", user.id);
    Ok(Json(MessageDataResponse::new("Profile updated", user)))
}

/// PUT /api/profile/password
async fn change_password(
    auth: Authorized<AnyRole>,
    State(state): State<AppState>,
    JsonBody(request): JsonBody<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !verify_password(&request.old_password, &auth.user.password_hash)? {
        return Err(AuthError::InvalidCredentials.into());
    }
    validate_password(&request.new_password)?;

    let password_hash = hash_password(&request.new_password)?;
    state
        .db
        .update_user_password(auth.user.id, &password_hash)
        .await?;

    info!("User {} changed their password", auth.user.id);
    Ok(Json(MessageResponse::new("Password updated")))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/profile", get(get_profile).put(update_profile))
        .route("/api/profile/password", put(change_password))
}
