//! Role listing

use axum::{Json, Router, extract::State, routing::get};
use simaling_auth::AuthUser;
use simaling_db::RoleRecord;

use crate::error::ApiError;
use crate::state::AppState;

use super::types::DataResponse;

/// GET /api/roles
async fn list_roles(
    _identity: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<DataResponse<Vec<RoleRecord>>>, ApiError> {
    let roles = state.db.list_roles().await?;
    Ok(Json(DataResponse { data: roles }))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/roles", get(list_roles))
}
