use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::SlotPolicy;
use shared_database::{SchedulingStore, StoreError};
use shared_models::scheduling::{day_window, Doctor, WorkingRange};

use crate::models::Slot;

pub struct AvailabilityCalculator {
    store: Arc<dyn SchedulingStore>,
    policy: SlotPolicy,
}

impl AvailabilityCalculator {
    pub fn new(store: Arc<dyn SchedulingStore>, policy: SlotPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> SlotPolicy {
        self.policy
    }

    /// Slots of a doctor for a calendar date. An unknown doctor or a storage
    /// failure yields an empty list.
    pub async fn compute(&self, doctor_id: Uuid, date: NaiveDate) -> Vec<Slot> {
        debug!("Computing {} slots for doctor {} on {}", self.policy, doctor_id, date);

        let doctor = match self.store.get_doctor_by_id(doctor_id).await {
            Ok(Some(doctor)) => doctor,
            Ok(None) => {
                debug!("Doctor {} not found, no slots", doctor_id);
                return Vec::new();
            }
            Err(e) => {
                warn!("Failed to load doctor {}: {}", doctor_id, e);
                return Vec::new();
            }
        };

        match self.slots_for(&doctor, date).await {
            Ok(slots) => slots,
            Err(e) => {
                warn!("Failed to load appointments of doctor {} on {}: {}", doctor_id, date, e);
                Vec::new()
            }
        }
    }

    /// Slots of an already loaded doctor; storage failures are returned.
    pub async fn slots_for(&self, doctor: &Doctor, date: NaiveDate) -> Result<Vec<Slot>, StoreError> {
        if doctor.working_ranges.is_empty() {
            return Ok(Vec::new());
        }

        let (from, to) = day_window(date);
        let appointments = self.store.list_by_doctor_between(doctor.id, from, to).await?;
        let times: Vec<NaiveTime> = appointments
            .iter()
            .map(|appointment| appointment.appointment_time.time())
            .collect();

        let slots = select_slots(&doctor.working_ranges, &times, self.policy);
        debug!(
            "Doctor {} has {} of {} ranges {} on {}",
            doctor.id,
            slots.len(),
            doctor.working_ranges.len(),
            self.policy,
            date
        );

        Ok(slots)
    }
}

/// Keep each range, in configured order, whose occupancy matches the policy.
pub fn select_slots(ranges: &[WorkingRange], booked: &[NaiveTime], policy: SlotPolicy) -> Vec<Slot> {
    ranges
        .iter()
        .filter(|range| {
            let occupied = booked.iter().any(|time| range.contains(*time));
            match policy {
                SlotPolicy::Occupied => occupied,
                SlotPolicy::Free => !occupied,
            }
        })
        .map(Slot::from)
        .collect()
}
