//! Authenticated `/api` routes
//!
//! Every handler here runs behind the authentication middleware and
//! declares its allowed roles through an `Authorized<_>` extractor.

pub mod funds;
pub mod home;
pub mod profile;
pub mod roles;
pub mod security_records;
pub mod types;
pub mod users;

use axum::Router;

use crate::state::AppState;

/// Create the authenticated API routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(roles::routes())
        .merge(profile::routes())
        .merge(home::routes())
        .merge(users::routes())
        .merge(funds::routes())
        .merge(security_records::routes())
}
