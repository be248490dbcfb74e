use crate::report::ReportService;
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;

pub mod handlers;
pub mod responses;

pub fn router(service: Arc<ReportService>) -> Router {
    Router::new()
        .route("/", get(handlers::get_root))
        .route("/trigger_report", post(handlers::trigger_report))
        .route("/get_report", get(handlers::get_report))
        .with_state(service)
}
