use std::sync::Arc;

use tracing::{debug, error, warn};

use doctor_cell::AvailabilityCalculator;
use shared_database::SchedulingStore;

use crate::models::{AppointmentError, SlotProposal, ValidationOutcome};

/// Checks a proposed start instant against the slots the availability
/// calculator reports for that date. The calculator's slot policy applies
/// here too.
pub struct ConflictValidator {
    store: Arc<dyn SchedulingStore>,
    calculator: Arc<AvailabilityCalculator>,
    enforce_slot_end: bool,
}

impl ConflictValidator {
    pub fn new(
        store: Arc<dyn SchedulingStore>,
        calculator: Arc<AvailabilityCalculator>,
        enforce_slot_end: bool,
    ) -> Self {
        Self {
            store,
            calculator,
            enforce_slot_end,
        }
    }

    /// Valid when the proposed time of day lies strictly after the start of
    /// some slot on that date (and strictly before its end when slot ends are
    /// enforced).
    pub async fn validate<P>(&self, proposal: &P) -> Result<ValidationOutcome, AppointmentError>
    where
        P: SlotProposal + ?Sized,
    {
        let doctor_id = proposal.doctor_id();
        let proposed = proposal.proposed_time();

        let doctor = match self.store.get_doctor_by_id(doctor_id).await {
            Ok(Some(doctor)) => doctor,
            Ok(None) => {
                warn!("Validation against unknown doctor {}", doctor_id);
                return Ok(ValidationOutcome::DoctorNotFound);
            }
            Err(e) => {
                error!("Failed to load doctor {} for validation: {}", doctor_id, e);
                return Err(e.into());
            }
        };

        let slots = self
            .calculator
            .slots_for(&doctor, proposed.date_naive())
            .await
            .map_err(|e| {
                error!("Failed to compute slots of doctor {} for validation: {}", doctor_id, e);
                AppointmentError::from(e)
            })?;

        let time = proposed.time();
        if slots.iter().any(|slot| slot.admits(time, self.enforce_slot_end)) {
            debug!("Proposal for doctor {} at {} is valid", doctor_id, proposed);
            Ok(ValidationOutcome::Valid)
        } else {
            debug!("No slot of doctor {} admits {} ({} candidate slots)", doctor_id, proposed, slots.len());
            Ok(ValidationOutcome::NoMatchingSlot)
        }
    }
}
