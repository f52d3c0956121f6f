//! Authentication middleware for Axum

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use simaling_db::Database;
use std::sync::Arc;
use tracing::debug;

use crate::error::AuthError;
use crate::jwt::JwtManager;

/// Everything the middleware and role gate need from application state
#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<JwtManager>,
    pub db: Database,
}

/// Authenticated caller, bound into request extensions
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    /// Normalised bearer token the request presented
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingIdentity)
    }
}

/// Strip an optional `Bearer ` scheme (any case) and surrounding whitespace.
///
/// Both blacklist insertion and lookup go through this function.
pub fn normalize_token(raw: &str) -> &str {
    let trimmed = raw.trim_start();
    let token = match trimmed.get(..6) {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer") => {
            let rest = &trimmed[6..];
            // The scheme must stand alone: "Bearerxyz" is a token, not a scheme
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                rest
            } else {
                trimmed
            }
        }
        _ => trimmed,
    };
    token.trim()
}

/// Authentication middleware
///
/// Rejects requests without a token, with a blacklisted token, or with a
/// token that fails signature or expiry checks. The blacklist lookup runs
/// before signature verification.
pub async fn auth_middleware(
    State(auth): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(normalize_token)
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    let Some(token) = token else {
        reject("missing");
        return Err(AuthError::MissingToken);
    };

    if auth.db.is_token_blacklisted(&token).await? {
        reject("blacklisted");
        return Err(AuthError::Blacklisted);
    }

    let claims = auth.jwt.validate_token(&token).inspect_err(|_| reject("invalid"))?;
    let user = AuthUser {
        id: claims.user_id()?,
        expires_at: claims.expires_at(),
        token,
    };

    debug!("Authenticated user: {}", user.id);

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

fn reject(reason: &'static str) {
    metrics::counter!("simaling_auth_rejections_total", "reason" => reason).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Extension, Router, body::Body, http::StatusCode, middleware, routing::get};
    use chrono::Duration;
    use tower::ServiceExt;

    #[test]
    fn normalize_strips_scheme_in_any_case() {
        assert_eq!(normalize_token("Bearer abc.def"), "abc.def");
        assert_eq!(normalize_token("bearer abc.def"), "abc.def");
        assert_eq!(normalize_token("  BEARER   abc.def  "), "abc.def");
        assert_eq!(normalize_token("abc.def"), "abc.def");
        assert_eq!(normalize_token("Bearer"), "");
        assert_eq!(normalize_token("Bearer "), "");
        assert_eq!(normalize_token("  bearer\t  "), "");
        assert_eq!(normalize_token("Bearerabc.def"), "Bearerabc.def");
    }

    async fn test_state(ttl: Duration) -> AuthState {
        AuthState {
            jwt: Arc::new(JwtManager::new("middleware-secret", ttl)),
            db: Database::new("sqlite::memory:").await.unwrap(),
        }
    }

    fn app(state: AuthState) -> Router {
        Router::new()
            .route("/whoami", get(|Extension(user): Extension<AuthUser>| async move { user.id.to_string() }))
            .layer(middleware::from_fn_with_state(state, auth_middleware))
    }

    async fn call(state: &AuthState, header: Option<&str>) -> (StatusCode, String) {
        let mut request = axum::http::Request::builder().uri("/whoami");
        if let Some(value) = header {
            request = request.header(AUTHORIZATION, value);
        }
        let response = app(state.clone())
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn valid_token_binds_identity() {
        let state = test_state(Duration::hours(1)).await;
        let token = state.jwt.generate_token(7).unwrap();

        let (status, body) = call(&state, Some(&format!("Bearer {}", token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "7");

        // Bare tokens are accepted too
        let (status, _) = call(&state, Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_or_empty_header_is_bad_request() {
        let state = test_state(Duration::hours(1)).await;

        let (status, body) = call(&state, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("token not found"));

        for header in ["Bearer   ", "Bearer", "bearer ", "   "] {
            let (status, body) = call(&state, Some(header)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "header {:?}", header);
            assert!(body.contains("token not found"));
        }
    }

    #[tokio::test]
    async fn invalid_and_expired_tokens_are_unauthorized() {
        let state = test_state(Duration::seconds(-120)).await;
        let expired = state.jwt.generate_token(1).unwrap();

        let (status, body) = call(&state, Some(&format!("Bearer {}", expired))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("invalid or expired token"));

        let (status, _) = call(&state, Some("Bearer not.a.jwt")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn blacklist_is_checked_before_signature() {
        let state = test_state(Duration::hours(1)).await;
        let token = state.jwt.generate_token(3).unwrap();
        state
            .db
            .blacklist_token(normalize_token(&format!("Bearer {}", token)), Utc::now() + Duration::hours(1))
            .await
            .unwrap();

        let (status, body) = call(&state, Some(&format!("bearer {}", token))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("token is blacklisted"));

        // A garbage token that happens to be blacklisted reports the blacklist
        state.db.blacklist_token("garbage", Utc::now()).await.unwrap();
        let (_, body) = call(&state, Some("Bearer garbage")).await;
        assert!(body.contains("token is blacklisted"));
    }
}
