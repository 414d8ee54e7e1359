// libs/appointment-cell/src/services/lifecycle.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use shared_database::{SchedulingStore, StoreError};
use shared_models::auth::{Principal, Role};
use shared_models::scheduling::{day_window, Appointment, AppointmentStatus, NewAppointment};

use crate::models::{
    active_filter, AppointmentError, BookOutcome, CancelOutcome, CompleteOutcome,
    UpdateOutcome, ValidationOutcome,
};
use crate::services::conflict::ConflictValidator;
use crate::services::locks::{DoctorLease, DoctorLocks};

/// Create, amend, cancel, complete and list appointments. Writes for one
/// doctor are serialized through `DoctorLocks`; the store rejects a second
/// appointment at the same doctor and instant.
pub struct AppointmentLifecycleManager {
    store: Arc<dyn SchedulingStore>,
    validator: Arc<ConflictValidator>,
    locks: DoctorLocks,
}

impl AppointmentLifecycleManager {
    pub fn new(store: Arc<dyn SchedulingStore>, validator: Arc<ConflictValidator>) -> Self {
        Self {
            store,
            validator,
            locks: DoctorLocks::new(),
        }
    }

    // ==========================================================================
    // WRITES
    // ==========================================================================

    /// Persist a new appointment the caller has already validated.
    pub async fn book(&self, appointment: NewAppointment) -> BookOutcome {
        let _lease = self.locks.acquire(appointment.doctor_id).await;
        self.save(appointment).await
    }

    /// Validate and persist under one doctor lease: the slot check and the
    /// write cannot interleave with another booking for the same doctor.
    pub async fn book_validated(&self, appointment: NewAppointment) -> BookOutcome {
        let _lease = self.locks.acquire(appointment.doctor_id).await;

        match self.validator.validate(&appointment).await {
            Ok(ValidationOutcome::Valid) => self.save(appointment).await,
            Ok(rejected) => {
                warn!(
                    "Rejected booking with doctor {} at {}: {:?}",
                    appointment.doctor_id, appointment.appointment_time, rejected
                );
                BookOutcome::Rejected(rejected)
            }
            Err(e) => {
                error!("Validation failed for booking with doctor {}: {}", appointment.doctor_id, e);
                BookOutcome::WriteFailed
            }
        }
    }

    async fn save(&self, appointment: NewAppointment) -> BookOutcome {
        let doctor_id = appointment.doctor_id;
        let at = appointment.appointment_time;

        match self.store.save_appointment(appointment).await {
            Ok(saved) if !saved.id.is_nil() => {
                info!("Booked appointment {} with doctor {} at {}", saved.id, doctor_id, at);
                BookOutcome::Booked(saved)
            }
            Ok(_) => {
                error!("Store returned an appointment without identity for doctor {}", doctor_id);
                BookOutcome::WriteFailed
            }
            Err(StoreError::Duplicate) => {
                warn!("Doctor {} is already booked at {}", doctor_id, at);
                BookOutcome::Conflict
            }
            Err(e) => {
                error!("Failed to book appointment with doctor {}: {}", doctor_id, e);
                BookOutcome::WriteFailed
            }
        }
    }

    /// Move a scheduled appointment to a new doctor and/or time. Nothing is
    /// written unless the validator accepts the new time. Completed
    /// appointments stay where they are.
    pub async fn update(&self, appointment: Appointment) -> UpdateOutcome {
        let (existing, _lease) = match self.lock_existing(appointment.id, Some(appointment.doctor_id)).await {
            Ok(Some(found)) => found,
            Ok(None) => {
                debug!("Update of unknown appointment {}", appointment.id);
                return UpdateOutcome::NotFound;
            }
            Err(e) => {
                error!("Failed to load appointment {} for update: {}", appointment.id, e);
                return UpdateOutcome::WriteFailed;
            }
        };

        if existing.patient_id != appointment.patient_id {
            warn!("Patient {} may not move appointment {}", appointment.patient_id, appointment.id);
            return UpdateOutcome::Forbidden;
        }

        if existing.status == AppointmentStatus::Completed {
            warn!("Appointment {} is completed and cannot be moved", existing.id);
            return UpdateOutcome::AlreadyCompleted;
        }

        match self.validator.validate(&appointment).await {
            Ok(ValidationOutcome::Valid) => {}
            Ok(ValidationOutcome::DoctorNotFound) => return UpdateOutcome::DoctorNotFound,
            Ok(ValidationOutcome::NoMatchingSlot) => {
                warn!("Rejected move of appointment {} to {}", appointment.id, appointment.appointment_time);
                return UpdateOutcome::Conflict;
            }
            Err(e) => {
                error!("Validation failed for appointment {}: {}", appointment.id, e);
                return UpdateOutcome::WriteFailed;
            }
        }

        let replacement = Appointment {
            status: existing.status,
            ..appointment
        };

        match self.store.update_appointment(replacement).await {
            Ok(Some(updated)) => {
                info!("Moved appointment {} to {}", updated.id, updated.appointment_time);
                UpdateOutcome::Updated(updated)
            }
            Ok(None) => UpdateOutcome::NotFound,
            Err(StoreError::Duplicate) => {
                warn!("Appointment {} collides with an existing booking", existing.id);
                UpdateOutcome::Conflict
            }
            Err(e) => {
                error!("Failed to update appointment {}: {}", existing.id, e);
                UpdateOutcome::WriteFailed
            }
        }
    }

    /// Delete an appointment on behalf of `principal`. Patients and doctors
    /// may only cancel their own appointments; admins may cancel any.
    pub async fn cancel(&self, appointment_id: Uuid, principal: &Principal) -> CancelOutcome {
        let (existing, _lease) = match self.lock_existing(appointment_id, None).await {
            Ok(Some(found)) => found,
            Ok(None) => {
                debug!("Cancel of unknown appointment {}", appointment_id);
                return CancelOutcome::NotFound;
            }
            Err(e) => {
                error!("Failed to load appointment {} for cancellation: {}", appointment_id, e);
                return CancelOutcome::WriteFailed;
            }
        };

        if !may_cancel(principal, &existing) {
            warn!("{} {} may not cancel appointment {}", principal.role, principal.subject, appointment_id);
            return CancelOutcome::Forbidden;
        }

        match self.store.delete_appointment(appointment_id).await {
            Ok(true) => {
                info!("Cancelled appointment {}", appointment_id);
                CancelOutcome::Cancelled
            }
            Ok(false) => CancelOutcome::NotFound,
            Err(e) => {
                error!("Failed to cancel appointment {}: {}", appointment_id, e);
                CancelOutcome::WriteFailed
            }
        }
    }

    /// Mark an appointment completed. Only its own doctor or an admin may.
    pub async fn complete(&self, appointment_id: Uuid, principal: &Principal) -> CompleteOutcome {
        let (existing, _lease) = match self.lock_existing(appointment_id, None).await {
            Ok(Some(found)) => found,
            Ok(None) => return CompleteOutcome::NotFound,
            Err(e) => {
                error!("Failed to load appointment {} for completion: {}", appointment_id, e);
                return CompleteOutcome::WriteFailed;
            }
        };

        if !may_complete(principal, &existing) {
            warn!("{} {} may not complete appointment {}", principal.role, principal.subject, appointment_id);
            return CompleteOutcome::Forbidden;
        }

        if existing.status == AppointmentStatus::Completed {
            return CompleteOutcome::AlreadyCompleted;
        }

        match self.store.update_status(appointment_id, AppointmentStatus::Completed).await {
            Ok(Some(completed)) => {
                info!("Completed appointment {}", appointment_id);
                CompleteOutcome::Completed(completed)
            }
            Ok(None) => CompleteOutcome::NotFound,
            Err(e) => {
                error!("Failed to complete appointment {}: {}", appointment_id, e);
                CompleteOutcome::WriteFailed
            }
        }
    }

    /// Load an appointment and lock its doctor, plus `other_doctor` when
    /// given. The record is re-read under the lock; if its doctor moved in the
    /// meantime the locks are taken again.
    async fn lock_existing(
        &self,
        appointment_id: Uuid,
        other_doctor: Option<Uuid>,
    ) -> Result<Option<(Appointment, DoctorLease)>, StoreError> {
        let mut current = match self.store.find_appointment_by_id(appointment_id).await? {
            Some(found) => found,
            None => return Ok(None),
        };

        loop {
            let lease = match other_doctor {
                Some(other) => self.locks.acquire_pair(current.doctor_id, other).await,
                None => self.locks.acquire(current.doctor_id).await,
            };

            match self.store.find_appointment_by_id(appointment_id).await? {
                Some(fresh) if fresh.doctor_id == current.doctor_id => return Ok(Some((fresh, lease))),
                Some(fresh) => {
                    debug!("Appointment {} changed doctor while locking, retrying", appointment_id);
                    current = fresh;
                }
                None => return Ok(None),
            }
        }
    }

    // ==========================================================================
    // READS
    // ==========================================================================

    /// A doctor's appointments on `date`, earliest first, optionally only
    /// those of the patient with exactly this name.
    pub async fn query(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        patient_name: Option<&str>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let (from, to) = day_window(date);
        let appointments = self
            .store
            .list_by_doctor_between(doctor_id, from, to)
            .await
            .map_err(|e| {
                error!("Failed to list appointments of doctor {} on {}: {}", doctor_id, date, e);
                AppointmentError::from(e)
            })?;

        let Some(name) = active_filter(patient_name) else {
            return Ok(appointments);
        };

        let mut names: HashMap<Uuid, Option<String>> = HashMap::new();
        let mut matching = Vec::new();
        for appointment in appointments {
            if !names.contains_key(&appointment.patient_id) {
                let patient = self.store.get_patient_by_id(appointment.patient_id).await?;
                names.insert(appointment.patient_id, patient.map(|p| p.name));
            }
            if names.get(&appointment.patient_id).and_then(|n| n.as_deref()) == Some(name) {
                matching.push(appointment);
            }
        }

        debug!("{} appointments of doctor {} on {} match patient '{}'", matching.len(), doctor_id, date, name);
        Ok(matching)
    }

    /// The doctor dashboard path: resolve the doctor from its e-mail first.
    pub async fn query_for_doctor_email(
        &self,
        email: &str,
        date: NaiveDate,
        patient_name: Option<&str>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let doctor = self
            .store
            .get_doctor_by_email(email)
            .await?
            .ok_or(AppointmentError::DoctorNotFound)?;

        self.query(doctor.id, date, patient_name).await
    }
}

fn may_cancel(principal: &Principal, appointment: &Appointment) -> bool {
    match principal.role {
        Role::Admin => true,
        Role::Patient => principal.subject == appointment.patient_id.to_string(),
        Role::Doctor => principal.subject == appointment.doctor_id.to_string(),
    }
}

fn may_complete(principal: &Principal, appointment: &Appointment) -> bool {
    match principal.role {
        Role::Admin => true,
        Role::Doctor => principal.subject == appointment.doctor_id.to_string(),
        Role::Patient => false,
    }
}
