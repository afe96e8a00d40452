// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers;
use crate::state::SchedulingState;

pub fn appointment_routes(state: Arc<SchedulingState>) -> Router {
    // Role checks happen per handler through the state's access policy
    Router::new()
        .route(
            "/appointments",
            post(handlers::create_appointment).get(handlers::list_all_appointments),
        )
        .route(
            "/clinicians/{clinician_id}/appointments",
            get(handlers::list_clinician_appointments),
        )
        .with_state(state)
}
