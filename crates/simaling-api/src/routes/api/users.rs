//! User management routes (admin only)

use axum::{Json, Router, extract::State, routing::get};
use simaling_auth::{AdminOnly, Authorized, hash_password};
use simaling_db::{
    DbError, FamilyMemberChange, NewFamilyMember, NewUser, Role, UpdateUser, UserQuery,
};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::state::AppState;

use super::types::{
    CreateUserRequest, DataResponse, FamilyMemberRequest, MessageResponse, Page, Paginated,
    UpdateUserRequest, UserDetail, UserListQuery, UserMutationResponse, non_empty,
};

// ==================== Input Validation ====================

/// Maximum allowed phone number length
const MAX_PHONE_LENGTH: usize = 20;
/// Maximum allowed password length
const MAX_PASSWORD_LENGTH: usize = 256;
/// Minimum allowed password length
const MIN_PASSWORD_LENGTH: usize = 8;

/// Validate phone number: digits with an optional leading `+`
pub(super) fn validate_phone(phone_no: &str) -> Result<(), ApiError> {
    if phone_no.is_empty() {
        return Err(ApiError::bad_request("Phone number cannot be empty"));
    }
    if phone_no.len() > MAX_PHONE_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Phone number exceeds maximum length of {} characters",
            MAX_PHONE_LENGTH
        )));
    }
    let digits = phone_no.strip_prefix('+').unwrap_or(phone_no);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::bad_request("Phone number can only contain digits"));
    }
    Ok(())
}

/// Validate password length
pub(super) fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        )));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Password exceeds maximum length of {} characters",
            MAX_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

fn parse_role(role_id: i64) -> Result<Role, ApiError> {
    Role::from_id(role_id).ok_or_else(|| ApiError::bad_request("Invalid role"))
}

fn validate_name(name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("Name cannot be empty"));
    }
    Ok(name.to_string())
}

fn duplicate_as_bad_request(err: DbError) -> ApiError {
    match err {
        DbError::Duplicate(_) => ApiError::bad_request("User already exists"),
        other => other.into(),
    }
}

// ==================== User Routes ====================

/// GET /api/users
async fn list_users(
    _admin: Authorized<AdminOnly>,
    State(state): State<AppState>,
    QueryParams(query): QueryParams<UserListQuery>,
) -> Result<Json<Paginated<simaling_db::User>>, ApiError> {
    let page = Page::parse(query.page.as_deref(), query.limit.as_deref())?;

    let (users, total) = state
        .db
        .list_users(UserQuery {
            name: non_empty(query.name.as_deref()),
            offset: page.offset(),
            limit: page.limit,
        })
        .await?;

    Ok(Json(Paginated::new(users, total, page)))
}

/// POST /api/users
async fn create_user(
    _admin: Authorized<AdminOnly>,
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateUserRequest>,
) -> Result<Json<UserMutationResponse>, ApiError> {
    let phone_no = request.phone_no.trim().to_string();
    validate_phone(&phone_no)?;
    validate_password(&request.password)?;
    let name = validate_name(&request.name)?;
    let role = parse_role(request.role_id)?;
    let family = request
        .family_members
        .iter()
        .map(FamilyMemberRequest::to_new_member)
        .collect::<Result<Vec<NewFamilyMember>, _>>()?;

    debug!("Creating user with {} family members", family.len());

    let password_hash = hash_password(&request.password)?;

    let (user, family_members) = state
        .db
        .insert_user(
            NewUser {
                phone_no,
                nik: non_empty(request.nik.as_deref()),
                email: non_empty(request.email.as_deref()),
                password_hash,
                name,
                address: request.address.trim().to_string(),
                role,
            },
            family,
        )
        .await
        .map_err(duplicate_as_bad_request)?;

    info!("Created user {} with role {}", user.id, role);

    Ok(Json(UserMutationResponse {
        message: "User and family members created successfully".to_string(),
        user: UserDetail {
            user,
            family_members,
        },
    }))
}

/// GET /api/users/{id}
async fn get_user(
    _admin: Authorized<AdminOnly>,
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<DataResponse<UserDetail>>, ApiError> {
    let user = state
        .db
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    let family_members = state.db.list_family_members(user.id).await?;

    Ok(Json(DataResponse {
        data: UserDetail {
            user,
            family_members,
        },
    }))
}

/// PUT /api/users/{id}
async fn update_user(
    _admin: Authorized<AdminOnly>,
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
    JsonBody(request): JsonBody<UpdateUserRequest>,
) -> Result<Json<UserMutationResponse>, ApiError> {
    let phone_no = request.phone_no.trim().to_string();
    validate_phone(&phone_no)?;
    let name = validate_name(&request.name)?;
    let role = parse_role(request.role_id)?;

    let password_hash = match non_empty(request.password.as_deref()) {
        Some(password) => {
            validate_password(&password)?;
            Some(hash_password(&password)?)
        }
        None => None,
    };

    let family = request
        .family_members
        .iter()
        .map(|m| -> Result<FamilyMemberChange, ApiError> {
            Ok(FamilyMemberChange {
                id: m.id,
                member: m.to_new_member()?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let user = state
        .db
        .update_user(
            id,
            UpdateUser {
                phone_no,
                nik: non_empty(request.nik.as_deref()),
                email: non_empty(request.email.as_deref()),
                name,
                address: request.address.trim().to_string(),
                role,
                password_hash,
            },
            family,
        )
        .await
        .map_err(duplicate_as_bad_request)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    let family_members = state.db.list_family_members(user.id).await?;

    info!("Updated user {}", user.id);

    Ok(Json(UserMutationResponse {
        message: "User and family members updated successfully".to_string(),
        user: UserDetail {
            user,
            family_members,
        },
    }))
}

/// DELETE /api/users/{id}
async fn delete_user(
    admin: Authorized<AdminOnly>,
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    if admin.user.id == id {
        return Err(ApiError::bad_request("Cannot delete your own account"));
    }

    if !state.db.delete_user(id).await? {
        return Err(ApiError::not_found("User not found"));
    }

    info!("Deleted user {}", id);
    Ok(Json(MessageResponse::new("User deleted")))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route(
            "/api/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
}
