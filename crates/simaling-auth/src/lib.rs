//! Simaling Authentication and Authorization
//!
//! This crate provides password hashing, JWT issuance, the bearer-token
//! middleware with its blacklist check, and the role gate used by the
//! Simaling API.

pub mod error;
pub mod guard;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod sweeper;

pub use error::AuthError;
pub use guard::{AdminOnly, AnyRole, Authorized, Members, ResidentsOnly, RoleSet, SecurityOnly, require_role};
pub use jwt::{Claims, JwtManager};
pub use middleware::{AuthState, AuthUser, auth_middleware, normalize_token};
pub use password::{hash_password, verify_password};
pub use sweeper::BlacklistSweeper;
