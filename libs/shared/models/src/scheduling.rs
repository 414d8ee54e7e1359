// libs/shared/models/src/scheduling.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ==============================================================================
// WORKING RANGES
// ==============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkingRangeError {
    #[error("Working range '{0}' must look like HH:MM-HH:MM")]
    MissingSeparator(String),

    #[error("Invalid time of day '{0}'")]
    InvalidTime(String),

    #[error("Working range must start before it ends ({start} >= {end})")]
    Inverted { start: NaiveTime, end: NaiveTime },
}

/// A time-of-day interval a doctor works, half-open: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkingRange {
    start: NaiveTime,
    end: NaiveTime,
}

impl WorkingRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, WorkingRangeError> {
        if start >= end {
            return Err(WorkingRangeError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time < self.end
    }

    pub fn label(&self) -> String {
        self.to_string()
    }
}

fn parse_time_of_day(raw: &str) -> Result<NaiveTime, WorkingRangeError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| WorkingRangeError::InvalidTime(raw.to_string()))
}

impl FromStr for WorkingRange {
    type Err = WorkingRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| WorkingRangeError::MissingSeparator(s.to_string()))?;

        WorkingRange::new(parse_time_of_day(start)?, parse_time_of_day(end)?)
    }
}

impl fmt::Display for WorkingRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

impl TryFrom<String> for WorkingRange {
    type Error = WorkingRangeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WorkingRange> for String {
    fn from(range: WorkingRange) -> Self {
        range.to_string()
    }
}

// ==============================================================================
// PEOPLE
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub specialty: String,
    pub email: String,
    #[serde(default)]
    pub working_ranges: Vec<WorkingRange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Completed,
}

impl AppointmentStatus {
    /// Stored status code: 0 = scheduled, 1 = completed.
    pub fn code(&self) -> i32 {
        match self {
            AppointmentStatus::Scheduled => 0,
            AppointmentStatus::Completed => 1,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(AppointmentStatus::Scheduled),
            1 => Some(AppointmentStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_time: DateTime<Utc>,
    #[serde(default)]
    pub status: AppointmentStatus,
}

/// An appointment before storage has assigned it an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAppointment {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_time: DateTime<Utc>,
    #[serde(default)]
    pub status: AppointmentStatus,
}

impl NewAppointment {
    pub fn scheduled(doctor_id: Uuid, patient_id: Uuid, appointment_time: DateTime<Utc>) -> Self {
        Self {
            doctor_id,
            patient_id,
            appointment_time,
            status: AppointmentStatus::Scheduled,
        }
    }

    pub fn with_id(self, id: Uuid) -> Appointment {
        Appointment {
            id,
            doctor_id: self.doctor_id,
            patient_id: self.patient_id,
            appointment_time: self.appointment_time,
            status: self.status,
        }
    }
}

/// Inclusive UTC bounds of a calendar day, from 00:00 to the last nanosecond.
pub fn day_window(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let last = NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or_default();
    let start = date.and_time(NaiveTime::default()).and_utc();
    let end = date.and_time(last).and_utc();
    (start, end)
}
