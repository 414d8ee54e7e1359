use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use appointment_cell::handlers::AppointmentState;
use appointment_cell::router::appointment_routes;
use auth_cell::AccessGate;
use doctor_cell::AvailabilityCalculator;
use shared_config::SlotPolicy;
use shared_database::{InMemoryStore, SchedulingStore};
use shared_models::scheduling::{AppointmentStatus, Doctor, NewAppointment};
use shared_utils::test_utils::{at, doctor_with_ranges, patient_named, TestConfig, TestUser};

struct Harness {
    store: Arc<InMemoryStore>,
    state: AppointmentState,
    config: TestConfig,
}

impl Harness {
    fn new(policy: SlotPolicy) -> Self {
        let config = TestConfig::default();
        let store = Arc::new(InMemoryStore::new());
        let calculator = Arc::new(AvailabilityCalculator::new(store.clone(), policy));
        let state = AppointmentState::new(
            store.clone(),
            AccessGate::new(config.token_service()),
            calculator,
            true,
        );

        Self { store, state, config }
    }

    fn app(&self) -> Router {
        appointment_routes(self.state.clone())
    }

    fn token_for(&self, user: &TestUser) -> String {
        user.token(self.config.token_service().as_ref())
    }

    async fn doctor(&self, ranges: &[&str]) -> Doctor {
        let doctor = doctor_with_ranges("Dr. Torres", ranges);
        self.store.insert_doctor(doctor.clone()).await;
        doctor
    }

    async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        self.app().oneshot(builder.body(body).unwrap()).await.unwrap()
    }
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_book_appointment_success_and_duplicate() {
    let h = Harness::new(SlotPolicy::Free);
    let doctor = h.doctor(&["09:00-10:00"]).await;
    let patient = TestUser::patient("ana@example.com");
    let token = h.token_for(&patient);
    let request = json!({ "doctor_id": doctor.id, "appointment_time": "2024-01-10T09:30:00Z" });

    let response = h.send("POST", "/", Some(&token), Some(request.clone())).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["appointment"]["patient_id"], json!(patient.id));
    assert_eq!(body["appointment"]["status"], json!("scheduled"));

    // The only range is now occupied, so it is no longer a free slot
    let again = h.send("POST", "/", Some(&token), Some(request)).await;
    assert_eq!(again.status(), StatusCode::CONFLICT);
    assert_eq!(h.store.appointment_count().await, 1);
}

#[tokio::test]
async fn test_book_for_unknown_doctor_is_not_found() {
    let h = Harness::new(SlotPolicy::Free);
    let token = h.token_for(&TestUser::patient("ana@example.com"));

    let response = h
        .send(
            "POST",
            "/",
            Some(&token),
            Some(json!({ "doctor_id": Uuid::new_v4(), "appointment_time": "2024-01-10T09:30:00Z" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_book_requires_patient_role() {
    let h = Harness::new(SlotPolicy::Free);
    let doctor = h.doctor(&["09:00-10:00"]).await;
    let token = h.token_for(&TestUser::doctor("doc@example.com"));

    let response = h
        .send(
            "POST",
            "/",
            Some(&token),
            Some(json!({ "doctor_id": doctor.id, "appointment_time": "2024-01-10T09:30:00Z" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(h.store.appointment_count().await, 0);
}

#[tokio::test]
async fn test_request_without_token_is_rejected_before_storage() {
    let h = Harness::new(SlotPolicy::Free);
    let doctor = h.doctor(&["09:00-10:00"]).await;
    h.store.fail_reads(true);

    let response = h
        .send(
            "POST",
            "/",
            None,
            Some(json!({ "doctor_id": doctor.id, "appointment_time": "2024-01-10T09:30:00Z" })),
        )
        .await;

    assert!(response.status().is_client_error());
    assert_eq!(h.store.appointment_count().await, 0);
}

#[tokio::test]
async fn test_validate_endpoint_reports_outcome() {
    let h = Harness::new(SlotPolicy::Occupied);
    let doctor = h.doctor(&["09:00-10:00"]).await;
    h.store
        .save_appointment(NewAppointment::scheduled(doctor.id, Uuid::new_v4(), at("2024-01-10T09:30")))
        .await
        .unwrap();
    let token = h.token_for(&TestUser::patient("ana@example.com"));

    let valid = h
        .send(
            "POST",
            "/validate",
            Some(&token),
            Some(json!({ "doctor_id": doctor.id, "appointment_time": "2024-01-10T09:45:00Z" })),
        )
        .await;
    assert_eq!(json_body(valid).await, json!({ "outcome": "valid", "code": 1 }));

    let unknown = h
        .send(
            "POST",
            "/validate",
            Some(&token),
            Some(json!({ "doctor_id": Uuid::new_v4(), "appointment_time": "2024-01-10T09:45:00Z" })),
        )
        .await;
    assert_eq!(json_body(unknown).await, json!({ "outcome": "doctor_not_found", "code": -1 }));
}

#[tokio::test]
async fn test_cancel_someone_elses_appointment_is_forbidden() {
    let h = Harness::new(SlotPolicy::Free);
    let doctor = h.doctor(&["09:00-10:00"]).await;
    let booked = h
        .store
        .save_appointment(NewAppointment::scheduled(doctor.id, Uuid::new_v4(), at("2024-01-10T09:30")))
        .await
        .unwrap();
    let token = h.token_for(&TestUser::patient("intruder@example.com"));

    let response = h.send("DELETE", &format!("/{}", booked.id), Some(&token), None).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(h.store.appointment_count().await, 1);
}

#[tokio::test]
async fn test_owner_cancels_and_unknown_id_is_not_found() {
    let h = Harness::new(SlotPolicy::Free);
    let doctor = h.doctor(&["09:00-10:00"]).await;
    let patient = TestUser::patient("ana@example.com");
    let booked = h
        .store
        .save_appointment(NewAppointment::scheduled(doctor.id, patient.id, at("2024-01-10T09:30")))
        .await
        .unwrap();
    let token = h.token_for(&patient);

    let response = h.send("DELETE", &format!("/{}", booked.id), Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let missing = h.send("DELETE", &format!("/{}", booked.id), Some(&token), None).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_rejected_time_is_conflict() {
    let h = Harness::new(SlotPolicy::Free);
    let doctor = h.doctor(&["09:00-10:00"]).await;
    let patient = TestUser::patient("ana@example.com");
    let booked = h
        .store
        .save_appointment(NewAppointment::scheduled(doctor.id, patient.id, at("2024-01-10T09:30")))
        .await
        .unwrap();
    let token = h.token_for(&patient);

    let response = h
        .send(
            "PUT",
            &format!("/{}", booked.id),
            Some(&token),
            Some(json!({ "doctor_id": doctor.id, "appointment_time": "2024-01-10T19:00:00Z" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let stored = h.store.find_appointment_by_id(booked.id).await.unwrap().unwrap();
    assert_eq!(stored.appointment_time, at("2024-01-10T09:30"));
}

#[tokio::test]
async fn test_doctor_completes_and_lists_day() {
    let h = Harness::new(SlotPolicy::Occupied);
    let doctor = h.doctor(&["09:00-10:00"]).await;
    let patient = patient_named("Ana Lima");
    h.store.insert_patient(patient.clone()).await;
    let booked = h
        .store
        .save_appointment(NewAppointment::scheduled(doctor.id, patient.id, at("2024-01-10T09:30")))
        .await
        .unwrap();
    let token = h.token_for(&TestUser::doctor(&doctor.email).with_id(doctor.id));

    let done = h.send("PATCH", &format!("/{}/complete", booked.id), Some(&token), None).await;
    assert_eq!(done.status(), StatusCode::OK);
    assert_eq!(json_body(done).await["appointment"]["status"], json!("completed"));

    let again = h.send("PATCH", &format!("/{}/complete", booked.id), Some(&token), None).await;
    assert_eq!(again.status(), StatusCode::CONFLICT);

    let day = h
        .send("GET", "/doctor?date=2024-01-10&patient_name=Ana%20Lima", Some(&token), None)
        .await;
    assert_eq!(day.status(), StatusCode::OK);
    let body = json_body(day).await;
    assert_eq!(body["total"], json!(1));
    assert_eq!(body["appointments"][0]["id"], json!(booked.id));
}

#[tokio::test]
async fn test_patient_views_reject_unknown_condition() {
    let h = Harness::new(SlotPolicy::Occupied);
    let token = h.token_for(&TestUser::patient("ana@example.com"));

    let bad = h.send("GET", "/patient?condition=someday", Some(&token), None).await;
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(bad).await["error"].as_str().unwrap().contains("someday"));

    let empty = h.send("GET", "/patient?condition=future", Some(&token), None).await;
    assert_eq!(empty.status(), StatusCode::OK);
    assert_eq!(json_body(empty).await["total"], json!(0));
}

#[tokio::test]
async fn test_stranger_doctor_cannot_complete() {
    let h = Harness::new(SlotPolicy::Occupied);
    let doctor = h.doctor(&["09:00-10:00"]).await;
    let booked = h
        .store
        .save_appointment(NewAppointment::scheduled(doctor.id, Uuid::new_v4(), at("2024-01-10T09:30")))
        .await
        .unwrap();
    let token = h.token_for(&TestUser::doctor("other@example.com"));

    let response = h.send("PATCH", &format!("/{}/complete", booked.id), Some(&token), None).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let stored = h.store.find_appointment_by_id(booked.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AppointmentStatus::Scheduled);
}

#[tokio::test]
async fn test_completed_appointment_cannot_be_rescheduled() {
    let h = Harness::new(SlotPolicy::Free);
    let doctor = h.doctor(&["09:00-10:00", "14:00-16:00"]).await;
    let patient = TestUser::patient("ana@example.com");
    let booked = h
        .store
        .save_appointment(NewAppointment::scheduled(doctor.id, patient.id, at("2024-01-10T09:30")))
        .await
        .unwrap();
    let doctor_token = h.token_for(&TestUser::doctor(&doctor.email).with_id(doctor.id));
    let done = h.send("PATCH", &format!("/{}/complete", booked.id), Some(&doctor_token), None).await;
    assert_eq!(done.status(), StatusCode::OK);

    let response = h
        .send(
            "PUT",
            &format!("/{}", booked.id),
            Some(&h.token_for(&patient)),
            Some(json!({ "doctor_id": doctor.id, "appointment_time": "2024-01-11T14:30:00Z" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let stored = h.store.find_appointment_by_id(booked.id).await.unwrap().unwrap();
    assert_eq!(stored.appointment_time, at("2024-01-10T09:30"));
    assert_eq!(stored.status, AppointmentStatus::Completed);
}
