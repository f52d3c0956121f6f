//! Login and logout

use axum::{Json, Router, extract::State, routing::post};
use simaling_auth::{AuthError, AuthUser, verify_password};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::state::AppState;

use super::api::types::{LoginRequest, LoginResponse, MessageResponse, non_empty};

/// Maximum allowed password length
const MAX_PASSWORD_LENGTH: usize = 256;

/// Valid Argon2 hash verified when the account does not exist, so unknown
/// accounts cost the same as wrong passwords
const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$dGltaW5nX2F0dGFja19wcmV2ZW50aW9u$K8rI5T7VdQ8xkO0GqK5K2w";

/// POST /login
async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if request.password.len() > MAX_PASSWORD_LENGTH {
        return Err(ApiError::bad_request("Invalid request"));
    }

    let user = match (
        non_empty(request.phone_no.as_deref()),
        non_empty(request.nik.as_deref()),
    ) {
        (Some(phone_no), _) => {
            debug!("Login attempt by phone number");
            state.db.get_user_by_phone(&phone_no).await?
        }
        (None, Some(nik)) => {
            debug!("Login attempt by NIK");
            state.db.get_user_by_nik(&nik).await?
        }
        (None, None) => return Err(ApiError::bad_request("Invalid request")),
    };

    let hash_to_verify = user
        .as_ref()
        .map(|u| u.password_hash.as_str())
        .unwrap_or(DUMMY_HASH);
    let password_valid = verify_password(&request.password, hash_to_verify)?;

    let user = match (user, password_valid) {
        (Some(u), true) => u,
        _ => {
            metrics::counter!("simaling_logins_total", "outcome" => "failure").increment(1);
            return Err(AuthError::InvalidCredentials.into());
        }
    };

    let token = state.jwt.generate_token(user.id)?;
    metrics::counter!("simaling_logins_total", "outcome" => "success").increment(1);

    info!("User {} logged in", user.id);

    Ok(Json(LoginResponse {
        message: "Login success".to_string(),
        token,
        role: user.role_id,
    }))
}

/// POST /api/logout
async fn logout(
    State(state): State<AppState>,
    identity: AuthUser,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .db
        .blacklist_token(&identity.token, identity.expires_at)
        .await?;

    info!("User {} logged out", identity.id);

    Ok(Json(MessageResponse::new("Logout success")))
}

/// Routes reachable without a token
pub fn public_routes() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

/// Routes behind the authentication middleware
pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/api/logout", post(logout))
}
