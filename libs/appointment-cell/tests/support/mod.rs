#![allow(dead_code)]

use std::sync::Arc;

use uuid::Uuid;

use appointment_cell::{AppointmentLifecycleManager, ConflictValidator, PatientAppointmentService};
use doctor_cell::AvailabilityCalculator;
use shared_config::SlotPolicy;
use shared_database::{InMemoryStore, SchedulingStore};
use shared_models::auth::Principal;
use shared_models::scheduling::{Appointment, Doctor, NewAppointment, Patient};
use shared_utils::test_utils::{at, doctor_with_ranges, patient_named, TestUser};

/// In-memory store with the scheduling services wired the way the API wires them.
pub struct Clinic {
    pub store: Arc<InMemoryStore>,
    pub validator: Arc<ConflictValidator>,
    pub lifecycle: Arc<AppointmentLifecycleManager>,
    pub history: PatientAppointmentService,
}

impl Clinic {
    pub fn new(policy: SlotPolicy) -> Self {
        Self::with_slot_end(policy, true)
    }

    pub fn with_slot_end(policy: SlotPolicy, enforce_slot_end: bool) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let calculator = Arc::new(AvailabilityCalculator::new(store.clone(), policy));
        let validator = Arc::new(ConflictValidator::new(store.clone(), calculator, enforce_slot_end));

        Self {
            lifecycle: Arc::new(AppointmentLifecycleManager::new(store.clone(), validator.clone())),
            history: PatientAppointmentService::new(store.clone()),
            validator,
            store,
        }
    }

    pub async fn doctor(&self, name: &str, ranges: &[&str]) -> Doctor {
        let doctor = doctor_with_ranges(name, ranges);
        self.store.insert_doctor(doctor.clone()).await;
        doctor
    }

    pub async fn patient(&self, name: &str) -> Patient {
        let patient = patient_named(name);
        self.store.insert_patient(patient.clone()).await;
        patient
    }

    /// Store an appointment directly, bypassing validation and locks.
    pub async fn seed(&self, doctor_id: Uuid, patient_id: Uuid, instant: &str) -> Appointment {
        self.store
            .save_appointment(NewAppointment::scheduled(doctor_id, patient_id, at(instant)))
            .await
            .expect("seed appointment")
    }
}

pub fn admin() -> Principal {
    TestUser::admin("admin@example.com").to_principal()
}

pub fn treating_doctor(doctor: &Doctor) -> Principal {
    TestUser::doctor(&doctor.email).with_id(doctor.id).to_principal()
}
