use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::{AppConfig, SchedulingConfig};
use shared_models::auth::{Principal, Role};
use shared_models::scheduling::{Appointment, Doctor, Patient, WorkingRange};

use crate::jwt::HmacTokenService;
use crate::token::TokenService;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub scheduling: SchedulingConfig,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            scheduling: SchedulingConfig::default(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            jwt_secret: self.jwt_secret.clone(),
            token_ttl_hours: 24,
            bind_addr: "127.0.0.1:0".to_string(),
            scheduling: self.scheduling,
        }
    }

    pub fn token_service(&self) -> Arc<HmacTokenService> {
        Arc::new(HmacTokenService::new(self.jwt_secret.clone(), Duration::hours(24)))
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl TestUser {
    pub fn new(email: &str, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role,
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, Role::Doctor)
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, Role::Patient)
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, Role::Admin)
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn to_principal(&self) -> Principal {
        Principal {
            subject: self.id.to_string(),
            email: Some(self.email.clone()),
            role: self.role,
        }
    }

    pub fn token(&self, tokens: &dyn TokenService) -> String {
        tokens
            .issue(&self.to_principal())
            .expect("test token should sign")
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        HmacTokenService::new(secret, Duration::hours(24))
            .issue_with_ttl(
                &user.id.to_string(),
                Some(&user.email),
                user.role,
                Duration::hours(exp_hours.unwrap_or(24)),
            )
            .expect("test token should sign")
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

// ==============================================================================
// SCHEDULING FIXTURES
// ==============================================================================

pub fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("fixture date")
}

/// `at("2024-01-10T09:30")` as a UTC instant.
pub fn at(raw: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .expect("fixture instant")
        .and_utc()
}

pub fn doctor_with_ranges(name: &str, ranges: &[&str]) -> Doctor {
    let slug = name.to_lowercase().replace(['.', ' '], "");
    Doctor {
        id: Uuid::new_v4(),
        name: name.to_string(),
        specialty: "General Practice".to_string(),
        email: format!("{}@clinic.example", slug),
        working_ranges: ranges
            .iter()
            .map(|raw| raw.parse::<WorkingRange>().expect("fixture range"))
            .collect(),
    }
}

pub fn patient_named(name: &str) -> Patient {
    let slug = name.to_lowercase().replace(' ', ".");
    Patient {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: format!("{}@example.com", slug),
        phone: Some("555-0100".to_string()),
        address: None,
    }
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn doctor_row(doctor: &Doctor) -> Value {
        json!({
            "id": doctor.id,
            "name": doctor.name,
            "specialty": doctor.specialty,
            "email": doctor.email,
            "available_times": doctor.working_ranges.iter().map(|r| r.label()).collect::<Vec<_>>()
        })
    }

    pub fn patient_row(patient: &Patient) -> Value {
        json!({
            "id": patient.id,
            "name": patient.name,
            "email": patient.email,
            "phone": patient.phone,
            "address": patient.address
        })
    }

    pub fn appointment_row(appointment: &Appointment) -> Value {
        json!({
            "id": appointment.id,
            "doctor_id": appointment.doctor_id,
            "patient_id": appointment.patient_id,
            "appointment_time": appointment.appointment_time.to_rfc3339(),
            "status": appointment.status.code()
        })
    }
}
