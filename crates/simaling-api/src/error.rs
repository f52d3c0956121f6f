//! API error types

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] simaling_db::DbError),

    #[error("Auth error: {0}")]
    Auth(#[from] simaling_auth::AuthError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!("Rejected JSON body: {}", rejection.body_text());
        ApiError::bad_request("Invalid request")
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        debug!("Rejected query string: {}", rejection.body_text());
        ApiError::bad_request("Invalid request")
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        debug!("Rejected path parameters: {}", rejection.body_text());
        ApiError::bad_request("Invalid request")
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        debug!("Rejected multipart body: {}", rejection.body_text());
        ApiError::bad_request("Invalid request")
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        debug!("Malformed multipart field: {}", err.body_text());
        ApiError::bad_request("Invalid request")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Auth(e) => return e.into_response(),
            ApiError::Database(simaling_db::DbError::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, format!("{} not found", msg))
            }
            ApiError::Database(simaling_db::DbError::Duplicate(_)) => {
                (StatusCode::BAD_REQUEST, "Duplicate entry".to_string())
            }
            err @ (ApiError::Internal(_) | ApiError::Database(_) | ApiError::Io(_)) => {
                error!("Request failed: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = axum::Json(json!({
            "message": message
        }));

        (status, body).into_response()
    }
}
