use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use shared_models::scheduling::WorkingRange;

/// A working range reported for a date, with its canonical `HH:MM-HH:MM` label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub label: String,
}

impl Slot {
    /// Strictly inside the slot, or strictly after its start when the end is
    /// not enforced.
    pub fn admits(&self, time: NaiveTime, enforce_end: bool) -> bool {
        time > self.start && (!enforce_end || time < self.end)
    }
}

impl From<&WorkingRange> for Slot {
    fn from(range: &WorkingRange) -> Self {
        Self {
            start: range.start(),
            end: range.end(),
            label: range.label(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
}
