//! Application state

use axum::extract::FromRef;
use simaling_auth::{AuthState, JwtManager};
use simaling_db::Database;
use std::sync::Arc;

use crate::uploads::UploadStore;

/// Prometheus handle served by the metrics endpoint
pub type MetricsHandle = metrics_exporter_prometheus::PrometheusHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub jwt: Arc<JwtManager>,
    pub uploads: Arc<UploadStore>,
}

impl AppState {
    pub fn new(db: Database, jwt: Arc<JwtManager>, uploads: Arc<UploadStore>) -> Self {
        Self { db, jwt, uploads }
    }
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        AuthState {
            jwt: state.jwt.clone(),
            db: state.db.clone(),
        }
    }
}
