//! API routes

mod api;
mod auth;
mod health;
pub mod metrics;

#[cfg(test)]
pub(crate) mod test_support;

use axum::{Router, extract::DefaultBodyLimit, middleware};
use simaling_auth::auth_middleware;
use std::sync::Arc;
use tower_http::services::ServeDir;

use crate::state::{AppState, MetricsHandle};

/// Upper bound on request bodies, sized for a receipt photo
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Create the main router
pub fn create_router(state: AppState, metrics_handle: Option<Arc<MetricsHandle>>) -> Router {
    // Everything under /api requires a valid, non-blacklisted token
    let protected = Router::new()
        .merge(auth::protected_routes())
        .merge(api::routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let uploads_dir = state.uploads.dir().to_path_buf();

    let mut router = Router::new()
        .merge(health::routes())
        .merge(auth::public_routes())
        .merge(protected)
        .with_state(state)
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

    if let Some(handle) = metrics_handle {
        router = router.merge(metrics::routes(handle));
    }

    router
}
