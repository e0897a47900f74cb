use crate::pipeline::ReportSettings;
use crate::source::ReportSource;
use crate::state::AppState;
use axum::Router;
use axum::routing::get;
use std::sync::{Arc, RwLock};

pub mod handlers;
pub mod responses;

/// Shared handles every endpoint needs.
#[derive(Debug, Clone)]
pub struct ApiContext {
    pub state: Arc<RwLock<AppState>>,
    pub source: Arc<dyn ReportSource>,
    pub settings: Arc<ReportSettings>,
}

pub fn router(context: ApiContext) -> Router {
    Router::new()
        .route(
            "/trigger_report",
            get(handlers::trigger_report).post(handlers::trigger_report),
        )
        .route("/get_report", get(handlers::get_report))
        .route("/get_report/{store_id}", get(handlers::get_store_report))
        .route("/api/health", get(handlers::get_health))
        .with_state(context)
}
