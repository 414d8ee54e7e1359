use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::scheduling::{Appointment, AppointmentStatus, Doctor, NewAppointment, Patient, WorkingRange};

use crate::store::{SchedulingStore, StoreError};

/// Non-success answer from the REST endpoint.
#[derive(Error, Debug)]
#[error("API error ({status}): {message}")]
pub struct SupabaseError {
    pub status: StatusCode,
    pub message: String,
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.anon_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let bearer = auth_token.unwrap_or(&self.anon_key);
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", bearer))?);

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(&self, method: Method, path: &str,
                                         auth_token: Option<&str>, body: Option<Value>,
                                         extra_headers: Option<HeaderMap>)
                                         -> Result<T>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);
            return Err(SupabaseError { status, message: error_text }.into());
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

// ==============================================================================
// ROW SHAPES
// ==============================================================================

#[derive(Debug, Deserialize)]
struct DoctorRow {
    id: Uuid,
    name: String,
    specialty: String,
    email: String,
    #[serde(default)]
    available_times: Vec<String>,
}

impl TryFrom<DoctorRow> for Doctor {
    type Error = StoreError;

    /// Unparseable or overnight ranges are skipped so one bad entry does not
    /// hide the doctor's other ranges.
    fn try_from(row: DoctorRow) -> Result<Self, Self::Error> {
        let working_ranges = row
            .available_times
            .iter()
            .filter_map(|raw| match raw.parse::<WorkingRange>() {
                Ok(range) => Some(range),
                Err(e) => {
                    warn!("Skipping working range of doctor {}: {}", row.id, e);
                    None
                }
            })
            .collect();

        Ok(Doctor {
            id: row.id,
            name: row.name,
            specialty: row.specialty,
            email: row.email,
            working_ranges,
        })
    }
}

#[derive(Debug, Deserialize)]
struct AppointmentRow {
    id: Uuid,
    doctor_id: Uuid,
    patient_id: Uuid,
    appointment_time: DateTime<Utc>,
    status: i32,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = StoreError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        let status = AppointmentStatus::from_code(row.status)
            .ok_or_else(|| StoreError::Decode(format!("appointment {}: unknown status {}", row.id, row.status)))?;

        Ok(Appointment {
            id: row.id,
            doctor_id: row.doctor_id,
            patient_id: row.patient_id,
            appointment_time: row.appointment_time,
            status,
        })
    }
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn to_store_error(err: anyhow::Error) -> StoreError {
    match err.downcast_ref::<SupabaseError>() {
        Some(api) if api.status == StatusCode::CONFLICT => StoreError::Duplicate,
        _ => StoreError::Backend(err.to_string()),
    }
}

fn decode_rows<R, T>(rows: Vec<Value>) -> Result<Vec<T>, StoreError>
where
    R: DeserializeOwned,
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter()
        .map(|row| {
            let row: R = serde_json::from_value(row).map_err(|e| StoreError::Decode(e.to_string()))?;
            T::try_from(row)
        })
        .collect()
}

fn first<T>(rows: Vec<T>) -> Option<T> {
    rows.into_iter().next()
}

// ==============================================================================
// STORE
// ==============================================================================

/// `SchedulingStore` over the PostgREST API. Uniqueness of
/// `(doctor_id, appointment_time)` comes from a unique index on the
/// `appointments` table; its 409 answer is reported as `StoreError::Duplicate`.
pub struct SupabaseStore {
    supabase: SupabaseClient,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn representation() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    async fn select(&self, path: &str) -> Result<Vec<Value>, StoreError> {
        self.supabase
            .request::<Vec<Value>>(Method::GET, path, None, None)
            .await
            .map_err(to_store_error)
    }

    async fn write(&self, method: Method, path: &str, body: Option<Value>) -> Result<Vec<Value>, StoreError> {
        self.supabase
            .request_with_headers::<Vec<Value>>(method, path, None, body, Some(Self::representation()))
            .await
            .map_err(to_store_error)
    }

    async fn appointments(&self, query: String) -> Result<Vec<Appointment>, StoreError> {
        let rows = self.select(&format!("/rest/v1/appointments?{}", query)).await?;
        decode_rows::<AppointmentRow, Appointment>(rows)
    }
}

#[async_trait]
impl SchedulingStore for SupabaseStore {
    async fn get_doctor_by_id(&self, id: Uuid) -> Result<Option<Doctor>, StoreError> {
        let rows = self.select(&format!("/rest/v1/doctors?id=eq.{}", id)).await?;
        Ok(first(decode_rows::<DoctorRow, Doctor>(rows)?))
    }

    async fn get_doctor_by_email(&self, email: &str) -> Result<Option<Doctor>, StoreError> {
        let path = format!("/rest/v1/doctors?email=eq.{}", urlencoding::encode(email));
        let rows = self.select(&path).await?;
        Ok(first(decode_rows::<DoctorRow, Doctor>(rows)?))
    }

    async fn get_patient_by_id(&self, id: Uuid) -> Result<Option<Patient>, StoreError> {
        let rows = self.select(&format!("/rest/v1/patients?id=eq.{}", id)).await?;
        rows.into_iter()
            .next()
            .map(|row| serde_json::from_value(row).map_err(|e| StoreError::Decode(e.to_string())))
            .transpose()
    }

    async fn list_by_doctor_between(
        &self,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.appointments(format!(
            "doctor_id=eq.{}&appointment_time=gte.{}&appointment_time=lte.{}&order=appointment_time.asc",
            doctor_id,
            timestamp(from),
            timestamp(to)
        ))
        .await
    }

    async fn list_by_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        self.appointments(format!("patient_id=eq.{}&order=appointment_time.asc", patient_id))
            .await
    }

    async fn list_by_patient_and_status(
        &self,
        patient_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.appointments(format!(
            "patient_id=eq.{}&status=eq.{}&order=appointment_time.asc",
            patient_id,
            status.code()
        ))
        .await
    }

    async fn find_appointment_by_id(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(first(self.appointments(format!("id=eq.{}", id)).await?))
    }

    async fn save_appointment(&self, appointment: NewAppointment) -> Result<Appointment, StoreError> {
        let body = json!({
            "doctor_id": appointment.doctor_id,
            "patient_id": appointment.patient_id,
            "appointment_time": timestamp(appointment.appointment_time),
            "status": appointment.status.code(),
        });

        let rows = self.write(Method::POST, "/rest/v1/appointments", Some(body)).await?;
        first(decode_rows::<AppointmentRow, Appointment>(rows)?)
            .ok_or_else(|| StoreError::Backend("insert returned no row".to_string()))
    }

    async fn update_appointment(&self, appointment: Appointment) -> Result<Option<Appointment>, StoreError> {
        let body = json!({
            "doctor_id": appointment.doctor_id,
            "patient_id": appointment.patient_id,
            "appointment_time": timestamp(appointment.appointment_time),
            "status": appointment.status.code(),
        });

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment.id);
        let rows = self.write(Method::PATCH, &path, Some(body)).await?;
        Ok(first(decode_rows::<AppointmentRow, Appointment>(rows)?))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Option<Appointment>, StoreError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let rows = self
            .write(Method::PATCH, &path, Some(json!({ "status": status.code() })))
            .await?;
        Ok(first(decode_rows::<AppointmentRow, Appointment>(rows)?))
    }

    async fn delete_appointment(&self, id: Uuid) -> Result<bool, StoreError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let rows = self.write(Method::DELETE, &path, None).await?;
        Ok(!rows.is_empty())
    }
}
