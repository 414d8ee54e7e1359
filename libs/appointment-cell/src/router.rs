// libs/appointment-cell/src/router.rs
use axum::{
    routing::{get, patch, post, put},
    Router,
};

use crate::handlers::{self, AppointmentState};

pub fn appointment_routes(state: AppointmentState) -> Router {
    Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/validate", post(handlers::validate_appointment))
        .route("/doctor", get(handlers::get_doctor_appointments))
        .route("/patient", get(handlers::get_patient_appointments))
        .route(
            "/{appointment_id}",
            put(handlers::update_appointment).delete(handlers::cancel_appointment),
        )
        .route("/{appointment_id}/complete", patch(handlers::complete_appointment))
        .with_state(state)
}
