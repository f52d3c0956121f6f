//! Authentication error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("token not found")]
    MissingToken,

    #[error("token is blacklisted")]
    Blacklisted,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("user not authenticated")]
    MissingIdentity,

    #[error("forbidden")]
    Forbidden,

    #[error("Invalid password")]
    InvalidCredentials,

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Token signing error: {0}")]
    TokenSigning(#[source] jsonwebtoken::errors::Error),

    #[error("Database error: {0}")]
    Database(#[from] simaling_db::DbError),
}

impl AuthError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingToken | AuthError::MissingIdentity | AuthError::InvalidCredentials => {
                StatusCode::BAD_REQUEST
            }
            AuthError::Blacklisted | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::PasswordHash(_) | AuthError::TokenSigning(_) | AuthError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            error!("Authentication failure: {}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = axum::Json(json!({
            "message": message
        }));

        (status, body).into_response()
    }
}
