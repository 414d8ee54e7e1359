// libs/appointment-cell/src/models.rs
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::error::AppError;
use shared_models::scheduling::{Appointment, AppointmentStatus, NewAppointment};

// ==============================================================================
// OUTCOMES
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationOutcome {
    DoctorNotFound,
    NoMatchingSlot,
    Valid,
}

impl ValidationOutcome {
    /// Legacy numeric form: -1 unknown doctor, 0 no slot, 1 valid.
    pub fn code(&self) -> i32 {
        match self {
            ValidationOutcome::DoctorNotFound => -1,
            ValidationOutcome::NoMatchingSlot => 0,
            ValidationOutcome::Valid => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookOutcome {
    Booked(Appointment),
    /// The validator refused the proposal; never `Valid`.
    Rejected(ValidationOutcome),
    Conflict,
    WriteFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated(Appointment),
    NotFound,
    /// The appointment belongs to another patient.
    Forbidden,
    AlreadyCompleted,
    Conflict,
    DoctorNotFound,
    WriteFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    NotFound,
    Forbidden,
    WriteFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompleteOutcome {
    Completed(Appointment),
    NotFound,
    Forbidden,
    AlreadyCompleted,
    WriteFailed,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppointmentError {
    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::DoctorNotFound => AppError::NotFound(err.to_string()),
            AppointmentError::Storage(e) => AppError::Database(e.to_string()),
        }
    }
}

// ==============================================================================
// PROPOSALS
// ==============================================================================

/// Anything the conflict validator can check: a doctor and a start instant.
pub trait SlotProposal {
    fn doctor_id(&self) -> Uuid;
    fn proposed_time(&self) -> DateTime<Utc>;
}

impl SlotProposal for Appointment {
    fn doctor_id(&self) -> Uuid {
        self.doctor_id
    }

    fn proposed_time(&self) -> DateTime<Utc> {
        self.appointment_time
    }
}

impl SlotProposal for NewAppointment {
    fn doctor_id(&self) -> Uuid {
        self.doctor_id
    }

    fn proposed_time(&self) -> DateTime<Utc> {
        self.appointment_time
    }
}

// ==============================================================================
// FILTERS
// ==============================================================================

/// Text filters treat an empty value and the literal `"null"` as absent.
pub fn active_filter(raw: Option<&str>) -> Option<&str> {
    raw.filter(|value| !value.is_empty() && *value != "null")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentCondition {
    Past,
    Future,
}

impl AppointmentCondition {
    pub fn status(&self) -> AppointmentStatus {
        match self {
            AppointmentCondition::Past => AppointmentStatus::Completed,
            AppointmentCondition::Future => AppointmentStatus::Scheduled,
        }
    }
}

impl FromStr for AppointmentCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "past" => Ok(AppointmentCondition::Past),
            "future" => Ok(AppointmentCondition::Future),
            other => Err(format!("unknown condition '{}', expected past or future", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientAppointmentFilter {
    pub condition: Option<AppointmentCondition>,
    pub doctor_name: Option<String>,
}

// ==============================================================================
// REQUEST / QUERY SHAPES
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    pub appointment_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub doctor_id: Uuid,
    pub appointment_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct DoctorScheduleQuery {
    pub date: NaiveDate,
    pub patient_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PatientAppointmentsQuery {
    pub condition: Option<String>,
    pub doctor_name: Option<String>,
}

impl PatientAppointmentsQuery {
    pub fn into_filter(self) -> Result<PatientAppointmentFilter, String> {
        let condition = active_filter(self.condition.as_deref())
            .map(str::parse::<AppointmentCondition>)
            .transpose()?;

        Ok(PatientAppointmentFilter {
            condition,
            doctor_name: active_filter(self.doctor_name.as_deref()).map(str::to_string),
        })
    }
}
