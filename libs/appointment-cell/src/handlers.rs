// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use auth_cell::AccessGate;
use doctor_cell::AvailabilityCalculator;
use shared_database::SchedulingStore;
use shared_models::auth::{Principal, Role};
use shared_models::error::AppError;
use shared_models::scheduling::{Appointment, AppointmentStatus, NewAppointment};

use crate::models::{
    BookAppointmentRequest, BookOutcome, CancelOutcome, CompleteOutcome, DoctorScheduleQuery,
    PatientAppointmentsQuery, UpdateAppointmentRequest, UpdateOutcome, ValidationOutcome,
};
use crate::services::{
    AppointmentLifecycleManager, ConflictValidator, PatientAppointmentService,
};

#[derive(Clone)]
pub struct AppointmentState {
    pub gate: AccessGate,
    pub validator: Arc<ConflictValidator>,
    pub lifecycle: Arc<AppointmentLifecycleManager>,
    pub history: Arc<PatientAppointmentService>,
}

impl AppointmentState {
    pub fn new(
        store: Arc<dyn SchedulingStore>,
        gate: AccessGate,
        calculator: Arc<AvailabilityCalculator>,
        enforce_slot_end: bool,
    ) -> Self {
        let validator = Arc::new(ConflictValidator::new(store.clone(), calculator, enforce_slot_end));

        Self {
            gate,
            lifecycle: Arc::new(AppointmentLifecycleManager::new(store.clone(), validator.clone())),
            history: Arc::new(PatientAppointmentService::new(store)),
            validator,
        }
    }
}

fn subject_id(principal: &Principal) -> Result<Uuid, AppError> {
    principal
        .subject
        .parse()
        .map_err(|_| AppError::Auth("Token subject is not a user id".to_string()))
}

fn rejected_proposal(outcome: ValidationOutcome) -> Option<AppError> {
    match outcome {
        ValidationOutcome::Valid => None,
        ValidationOutcome::DoctorNotFound => Some(AppError::NotFound("Doctor not found".to_string())),
        ValidationOutcome::NoMatchingSlot => Some(AppError::Conflict(
            "Requested time does not fall inside an available slot".to_string(),
        )),
    }
}

// ==============================================================================
// PATIENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn validate_appointment(
    State(state): State<AppointmentState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let principal = state.gate.authorize(auth.token(), Role::Patient)?;
    let proposal = NewAppointment::scheduled(request.doctor_id, subject_id(&principal)?, request.appointment_time);

    let outcome = state.validator.validate(&proposal).await?;

    Ok(Json(json!({
        "outcome": outcome,
        "code": outcome.code()
    })))
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppointmentState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let principal = state.gate.authorize(auth.token(), Role::Patient)?;
    let proposal = NewAppointment::scheduled(request.doctor_id, subject_id(&principal)?, request.appointment_time);

    match state.lifecycle.book_validated(proposal).await {
        BookOutcome::Booked(appointment) => Ok(Json(json!({
            "success": true,
            "appointment": appointment
        }))),
        BookOutcome::Rejected(outcome) => Err(rejected_proposal(outcome)
            .unwrap_or_else(|| AppError::Internal("Booking rejected a valid proposal".to_string()))),
        BookOutcome::Conflict => Err(AppError::Conflict("Doctor is already booked at this time".to_string())),
        BookOutcome::WriteFailed => Err(AppError::Internal("Failed to book appointment".to_string())),
    }
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let principal = state.gate.authorize(auth.token(), Role::Patient)?;

    let appointment = Appointment {
        id: appointment_id,
        doctor_id: request.doctor_id,
        patient_id: subject_id(&principal)?,
        appointment_time: request.appointment_time,
        status: AppointmentStatus::Scheduled,
    };

    match state.lifecycle.update(appointment).await {
        UpdateOutcome::Updated(updated) => Ok(Json(json!({
            "success": true,
            "appointment": updated
        }))),
        UpdateOutcome::NotFound => Err(AppError::NotFound("Appointment not found".to_string())),
        UpdateOutcome::Forbidden => Err(AppError::Forbidden("Appointment belongs to another patient".to_string())),
        UpdateOutcome::AlreadyCompleted => Err(AppError::Conflict("Completed appointments cannot be moved".to_string())),
        UpdateOutcome::Conflict => Err(AppError::Conflict("Requested time is not available".to_string())),
        UpdateOutcome::DoctorNotFound => Err(AppError::NotFound("Doctor not found".to_string())),
        UpdateOutcome::WriteFailed => Err(AppError::Internal("Failed to update appointment".to_string())),
    }
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let principal = state.gate.authorize(auth.token(), Role::Patient)?;

    match state.lifecycle.cancel(appointment_id, &principal).await {
        CancelOutcome::Cancelled => Ok(Json(json!({
            "success": true,
            "appointment_id": appointment_id
        }))),
        CancelOutcome::NotFound => Err(AppError::NotFound("Appointment not found".to_string())),
        CancelOutcome::Forbidden => Err(AppError::Forbidden("Not allowed to cancel this appointment".to_string())),
        CancelOutcome::WriteFailed => Err(AppError::Internal("Failed to cancel appointment".to_string())),
    }
}

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<AppointmentState>,
    Query(query): Query<PatientAppointmentsQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let principal = state.gate.authorize(auth.token(), Role::Patient)?;
    let patient_id = subject_id(&principal)?;
    let filter = query.into_filter().map_err(AppError::ValidationError)?;

    let appointments = state.history.list(patient_id, &filter).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

// ==============================================================================
// DOCTOR HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<AppointmentState>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let principal = state.gate.authorize(auth.token(), Role::Doctor)?;

    match state.lifecycle.complete(appointment_id, &principal).await {
        CompleteOutcome::Completed(appointment) => Ok(Json(json!({
            "success": true,
            "appointment": appointment
        }))),
        CompleteOutcome::NotFound => Err(AppError::NotFound("Appointment not found".to_string())),
        CompleteOutcome::Forbidden => Err(AppError::Forbidden("Appointment belongs to another doctor".to_string())),
        CompleteOutcome::AlreadyCompleted => Err(AppError::Conflict("Appointment is already completed".to_string())),
        CompleteOutcome::WriteFailed => Err(AppError::Internal("Failed to complete appointment".to_string())),
    }
}

/// The calling doctor's schedule for a date. The doctor is resolved from the
/// token's e-mail, or from its subject when the token carries none.
#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<AppointmentState>,
    Query(query): Query<DoctorScheduleQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let principal = state.gate.authorize(auth.token(), Role::Doctor)?;
    debug!("Doctor {} requested schedule for {}", principal.subject, query.date);

    let patient_name = query.patient_name.as_deref();
    let appointments = match principal.email.as_deref() {
        Some(email) => {
            state
                .lifecycle
                .query_for_doctor_email(email, query.date, patient_name)
                .await?
        }
        None => {
            state
                .lifecycle
                .query(subject_id(&principal)?, query.date, patient_name)
                .await?
        }
    };

    Ok(Json(json!({
        "date": query.date,
        "appointments": appointments,
        "total": appointments.len()
    })))
}
