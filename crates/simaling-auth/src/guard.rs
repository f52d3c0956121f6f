//! Role gate
//!
//! Handlers declare the roles they accept through the type parameter of
//! [`Authorized`]; the extractor loads the caller's user row and checks it
//! against the allow-list before the handler body runs.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use simaling_db::{Database, Role, User};
use std::marker::PhantomData;
use tracing::debug;

use crate::error::AuthError;
use crate::middleware::{AuthState, AuthUser};

/// A compile-time allow-list of roles
pub trait RoleSet: Send + Sync + 'static {
    const ALLOWED: &'static [Role];
}

/// Administrators only
pub struct AdminOnly;
/// Residents (the `User` role) only
pub struct ResidentsOnly;
/// Security guards only
pub struct SecurityOnly;
/// Administrators and residents
pub struct Members;
/// Any authenticated role
pub struct AnyRole;

impl RoleSet for AdminOnly {
    const ALLOWED: &'static [Role] = &[Role::Admin];
}

impl RoleSet for ResidentsOnly {
    const ALLOWED: &'static [Role] = &[Role::User];
}

impl RoleSet for SecurityOnly {
    const ALLOWED: &'static [Role] = &[Role::Security];
}

impl RoleSet for Members {
    const ALLOWED: &'static [Role] = &[Role::Admin, Role::User];
}

impl RoleSet for AnyRole {
    const ALLOWED: &'static [Role] = &Role::ALL;
}

/// Resolve the caller and check their role against `allowed`.
///
/// A missing identity, or one whose user row no longer exists, is
/// `MissingIdentity` (400); a role outside the allow-list is `Forbidden`.
pub async fn require_role(
    db: &Database,
    identity: Option<&AuthUser>,
    allowed: &[Role],
) -> Result<User, AuthError> {
    let identity = identity.ok_or(AuthError::MissingIdentity)?;
    let user = db
        .get_user_by_id(identity.id)
        .await?
        .ok_or(AuthError::MissingIdentity)?;

    match user.role() {
        Some(role) if allowed.contains(&role) => Ok(user),
        role => {
            debug!("User {} with role {:?} denied", user.id, role);
            Err(AuthError::Forbidden)
        }
    }
}

/// Extractor for a caller whose role is in `R::ALLOWED`
pub struct Authorized<R: RoleSet> {
    pub user: User,
    pub role: Role,
    pub identity: AuthUser,
    _roles: PhantomData<fn() -> R>,
}

impl<S, R> FromRequestParts<S> for Authorized<R>
where
    AuthState: FromRef<S>,
    S: Send + Sync,
    R: RoleSet,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthState::from_ref(state);
        let identity = parts.extensions.get::<AuthUser>().cloned();

        let user = require_role(&auth.db, identity.as_ref(), R::ALLOWED).await?;
        let role = user.role().ok_or(AuthError::Forbidden)?;

        Ok(Authorized {
            user,
            role,
            identity: identity.ok_or(AuthError::MissingIdentity)?,
            _roles: PhantomData,
        })
    }
}
