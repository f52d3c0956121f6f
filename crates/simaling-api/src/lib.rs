//! Simaling REST API
//!
//! This crate provides the Axum-based HTTP API for the Simaling community
//! backend: login and logout, user and family administration, the funds
//! ledger with its approval workflow, security guard check-ins and the
//! admin dashboard.

pub mod error;
pub mod extract;
pub mod routes;
pub mod state;
pub mod uploads;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppState, MetricsHandle};
pub use uploads::UploadStore;
