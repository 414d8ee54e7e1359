use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::handlers::AppointmentState;
use appointment_cell::router::appointment_routes;
use auth_cell::router::auth_routes;
use auth_cell::AccessGate;
use doctor_cell::handlers::DoctorState;
use doctor_cell::router::doctor_routes;
use doctor_cell::AvailabilityCalculator;
use shared_config::AppConfig;
use shared_database::SchedulingStore;
use shared_utils::TokenService;

/// One calculator serves both the availability endpoint and the conflict
/// validator, so both see the same slot policy.
pub fn create_router(
    config: &AppConfig,
    store: Arc<dyn SchedulingStore>,
    tokens: Arc<dyn TokenService>,
) -> Router {
    let gate = AccessGate::new(tokens);
    let calculator = Arc::new(AvailabilityCalculator::new(store.clone(), config.scheduling.slot_policy));

    let doctors = DoctorState {
        gate: gate.clone(),
        calculator: calculator.clone(),
    };
    let appointments = AppointmentState::new(
        store,
        gate.clone(),
        calculator,
        config.scheduling.enforce_slot_end,
    );

    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/auth", auth_routes(gate))
        .nest("/doctors", doctor_routes(doctors))
        .nest("/appointments", appointment_routes(appointments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use shared_database::InMemoryStore;
    use shared_utils::test_utils::{doctor_with_ranges, TestConfig, TestUser};

    #[tokio::test]
    async fn free_slot_can_be_booked_end_to_end() {
        let mut test_config = TestConfig::default();
        test_config.scheduling.slot_policy = shared_config::SlotPolicy::Free;
        let config = test_config.to_app_config();
        let tokens = test_config.token_service();

        let store = Arc::new(InMemoryStore::new());
        let doctor = doctor_with_ranges("Dr. Hunt", &["09:00-10:00", "14:00-16:00"]);
        let doctor_id = doctor.id;
        store.insert_doctor(doctor).await;

        let app = create_router(&config, store, tokens.clone());
        let token = TestUser::patient("ana@example.com").token(tokens.as_ref());

        let booking = Request::builder()
            .method("POST")
            .uri("/appointments")
            .header("authorization", format!("Bearer {}", token))
            .header("content-type", "application/json")
            .body(Body::from(
                json!({ "doctor_id": doctor_id, "appointment_time": "2024-01-10T09:30:00Z" }).to_string(),
            ))
            .unwrap();
        let response = app.clone().oneshot(booking).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let availability = Request::builder()
            .uri(format!("/doctors/{}/availability/patient?date=2024-01-10", doctor_id))
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(availability).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["availability"][0]["label"], json!("14:00-16:00"));
        assert_eq!(value["availability"].as_array().map(Vec::len), Some(1));
    }
}
