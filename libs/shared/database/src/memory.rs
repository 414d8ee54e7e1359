use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_models::scheduling::{Appointment, AppointmentStatus, Doctor, NewAppointment, Patient};

use crate::store::{SchedulingStore, StoreError};

#[derive(Default)]
struct Tables {
    doctors: HashMap<Uuid, Doctor>,
    patients: HashMap<Uuid, Patient>,
    appointments: HashMap<Uuid, Appointment>,
}

impl Tables {
    fn slot_taken(&self, doctor_id: Uuid, time: DateTime<Utc>, except: Option<Uuid>) -> bool {
        self.appointments.values().any(|existing| {
            existing.doctor_id == doctor_id
                && existing.appointment_time == time
                && Some(existing.id) != except
        })
    }
}

fn sorted_by_time(mut appointments: Vec<Appointment>) -> Vec<Appointment> {
    appointments.sort_by_key(|appointment| (appointment.appointment_time, appointment.id));
    appointments
}

/// Process-local store. Each call takes the table lock once, so existence
/// checks and writes cannot interleave with other callers. `(doctor_id,
/// appointment_time)` is unique across appointments.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_doctor(&self, doctor: Doctor) {
        self.tables.write().await.doctors.insert(doctor.id, doctor);
    }

    pub async fn insert_patient(&self, patient: Patient) {
        self.tables.write().await.patients.insert(patient.id, patient);
    }

    pub async fn appointment_count(&self) -> usize {
        self.tables.read().await.appointments.len()
    }

    /// Make subsequent reads fail with a backend error.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent writes fail with a backend error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_read(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("read failure injected".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("write failure injected".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SchedulingStore for InMemoryStore {
    async fn get_doctor_by_id(&self, id: Uuid) -> Result<Option<Doctor>, StoreError> {
        self.check_read()?;
        Ok(self.tables.read().await.doctors.get(&id).cloned())
    }

    async fn get_doctor_by_email(&self, email: &str) -> Result<Option<Doctor>, StoreError> {
        self.check_read()?;
        Ok(self
            .tables
            .read()
            .await
            .doctors
            .values()
            .find(|doctor| doctor.email == email)
            .cloned())
    }

    async fn get_patient_by_id(&self, id: Uuid) -> Result<Option<Patient>, StoreError> {
        self.check_read()?;
        Ok(self.tables.read().await.patients.get(&id).cloned())
    }

    async fn list_by_doctor_between(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.check_read()?;
        let tables = self.tables.read().await;
        let found = tables
            .appointments
            .values()
            .filter(|a| a.doctor_id == doctor_id && a.appointment_time >= from && a.appointment_time <= to)
            .cloned()
            .collect();
        Ok(sorted_by_time(found))
    }

    async fn list_by_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        self.check_read()?;
        let tables = self.tables.read().await;
        let found = tables
            .appointments
            .values()
            .filter(|a| a.patient_id == patient_id)
            .cloned()
            .collect();
        Ok(sorted_by_time(found))
    }

    async fn list_by_patient_and_status(
        &self,
        patient_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.check_read()?;
        let tables = self.tables.read().await;
        let found = tables
            .appointments
            .values()
            .filter(|a| a.patient_id == patient_id && a.status == status)
            .cloned()
            .collect();
        Ok(sorted_by_time(found))
    }

    async fn find_appointment_by_id(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        self.check_read()?;
        Ok(self.tables.read().await.appointments.get(&id).cloned())
    }

    async fn save_appointment(&self, appointment: NewAppointment) -> Result<Appointment, StoreError> {
        self.check_write()?;
        let mut tables = self.tables.write().await;

        if tables.slot_taken(appointment.doctor_id, appointment.appointment_time, None) {
            return Err(StoreError::Duplicate);
        }

        let saved = appointment.with_id(Uuid::new_v4());
        tables.appointments.insert(saved.id, saved.clone());
        debug!("Stored appointment {}", saved.id);

        Ok(saved)
    }

    async fn update_appointment(&self, appointment: Appointment) -> Result<Option<Appointment>, StoreError> {
        self.check_write()?;
        let mut tables = self.tables.write().await;

        if !tables.appointments.contains_key(&appointment.id) {
            return Ok(None);
        }
        if tables.slot_taken(appointment.doctor_id, appointment.appointment_time, Some(appointment.id)) {
            return Err(StoreError::Duplicate);
        }

        tables.appointments.insert(appointment.id, appointment.clone());
        Ok(Some(appointment))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Option<Appointment>, StoreError> {
        self.check_write()?;
        let mut tables = self.tables.write().await;

        Ok(tables.appointments.get_mut(&id).map(|appointment| {
            appointment.status = status;
            appointment.clone()
        }))
    }

    async fn delete_appointment(&self, id: Uuid) -> Result<bool, StoreError> {
        self.check_write()?;
        Ok(self.tables.write().await.appointments.remove(&id).is_some())
    }
}
