use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use shared_models::scheduling::{Appointment, AppointmentStatus, Doctor, NewAppointment, Patient};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("An appointment already exists for this doctor at this time")]
    Duplicate,

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Failed to decode stored record: {0}")]
    Decode(String),
}

/// Durable storage consumed by the scheduling services.
///
/// Every mutation is atomic and id-scoped: implementations check existence and
/// write in one step, and report an absent id through `None`/`false` rather
/// than an error.
#[async_trait]
pub trait SchedulingStore: Send + Sync {
    async fn get_doctor_by_id(&self, id: Uuid) -> Result<Option<Doctor>, StoreError>;

    async fn get_doctor_by_email(&self, email: &str) -> Result<Option<Doctor>, StoreError>;

    async fn get_patient_by_id(&self, id: Uuid) -> Result<Option<Patient>, StoreError>;

    /// Appointments of a doctor with `from <= appointment_time <= to`, earliest first.
    async fn list_by_doctor_between(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError>;

    async fn list_by_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, StoreError>;

    /// Appointments of a patient in one status, earliest first.
    async fn list_by_patient_and_status(
        &self,
        patient_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Vec<Appointment>, StoreError>;

    async fn find_appointment_by_id(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    /// Persist a new appointment and return it with its generated identity.
    async fn save_appointment(&self, appointment: NewAppointment) -> Result<Appointment, StoreError>;

    /// Replace an existing appointment; `None` when the id is unknown.
    async fn update_appointment(&self, appointment: Appointment) -> Result<Option<Appointment>, StoreError>;

    async fn update_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Option<Appointment>, StoreError>;

    /// Delete by id; `false` when nothing was deleted.
    async fn delete_appointment(&self, id: Uuid) -> Result<bool, StoreError>;
}
