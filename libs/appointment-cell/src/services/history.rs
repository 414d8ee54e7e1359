use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error};
use uuid::Uuid;

use shared_database::SchedulingStore;
use shared_models::scheduling::Appointment;

use crate::models::{AppointmentError, PatientAppointmentFilter};

/// The patient-side appointment views: past (completed) and future
/// (scheduled), optionally narrowed to one doctor by exact name.
pub struct PatientAppointmentService {
    store: Arc<dyn SchedulingStore>,
}

impl PatientAppointmentService {
    pub fn new(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    pub async fn list(
        &self,
        patient_id: Uuid,
        filter: &PatientAppointmentFilter,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let listed = match filter.condition {
            Some(condition) => {
                self.store
                    .list_by_patient_and_status(patient_id, condition.status())
                    .await
            }
            None => self.store.list_by_patient(patient_id).await,
        };

        let appointments = listed.map_err(|e| {
            error!("Failed to list appointments of patient {}: {}", patient_id, e);
            AppointmentError::from(e)
        })?;

        let Some(doctor_name) = filter.doctor_name.as_deref() else {
            return Ok(appointments);
        };

        let mut names: HashMap<Uuid, Option<String>> = HashMap::new();
        let mut matching = Vec::new();
        for appointment in appointments {
            if !names.contains_key(&appointment.doctor_id) {
                let doctor = self.store.get_doctor_by_id(appointment.doctor_id).await?;
                names.insert(appointment.doctor_id, doctor.map(|d| d.name));
            }
            if names.get(&appointment.doctor_id).and_then(|n| n.as_deref()) == Some(doctor_name) {
                matching.push(appointment);
            }
        }

        debug!(
            "{} appointments of patient {} with doctor '{}'",
            matching.len(),
            patient_id,
            doctor_name
        );
        Ok(matching)
    }
}
