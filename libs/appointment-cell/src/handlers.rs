// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::error;

use shared_models::error::AppError;
use shared_utils::extractor::CallerRole;

use crate::models::{Appointment, AppointmentError, AppointmentRangeQuery, CreateAppointmentRequest};
use crate::policy::SchedulingAction;
use crate::state::SchedulingState;

// ==============================================================================
// ERROR MAPPING
// ==============================================================================

fn booking_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::Conflict { .. } => AppError::Conflict(e.to_string()),
        AppointmentError::Store(msg) => {
            error!("Appointment booking failed in store: {}", msg);
            AppError::Database("Failed to create appointment".to_string())
        }
        AppointmentError::MissingFields
        | AppointmentError::InvalidDateFormat { .. }
        | AppointmentError::PastAppointment
        | AppointmentError::InvalidTimeRange => AppError::BadRequest(e.to_string()),
    }
}

fn listing_error(e: AppointmentError) -> AppError {
    if let AppointmentError::Store(msg) = &e {
        error!("Appointment listing failed in store: {}", msg);
    }
    AppError::BadRequest(e.to_string())
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<SchedulingState>>,
    caller: CallerRole,
    payload: Result<Json<CreateAppointmentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    state.policy.authorize(&caller, SchedulingAction::BookAppointment)?;

    let Json(request) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    if !request.has_required_fields() {
        return Err(booking_error(AppointmentError::MissingFields));
    }

    let appointment = state
        .booking
        .create_appointment(request)
        .await
        .map_err(booking_error)?;

    Ok((StatusCode::CREATED, Json(appointment)))
}

#[axum::debug_handler]
pub async fn list_clinician_appointments(
    State(state): State<Arc<SchedulingState>>,
    caller: CallerRole,
    Path(clinician_id): Path<String>,
    Query(range): Query<AppointmentRangeQuery>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    state.policy.authorize(&caller, SchedulingAction::ListClinicianAppointments)?;

    let appointments = state
        .query
        .list_appointments_for_clinician(&clinician_id, &range)
        .await
        .map_err(listing_error)?;

    Ok(Json(appointments))
}

#[axum::debug_handler]
pub async fn list_all_appointments(
    State(state): State<Arc<SchedulingState>>,
    caller: CallerRole,
    Query(range): Query<AppointmentRangeQuery>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    state.policy.authorize(&caller, SchedulingAction::ListAllAppointments)?;

    let appointments = state
        .query
        .list_all_appointments(&range)
        .await
        .map_err(listing_error)?;

    Ok(Json(appointments))
}
