use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::{appointment_routes, SchedulingState};

pub fn create_router(state: Arc<SchedulingState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic Scheduling API is running!" }))
        .merge(appointment_routes(state))
}
