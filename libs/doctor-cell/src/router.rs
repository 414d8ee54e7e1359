use axum::{routing::get, Router};

use crate::handlers::{self, DoctorState};

pub fn doctor_routes(state: DoctorState) -> Router {
    Router::new()
        .route("/{doctor_id}/availability/{role}", get(handlers::get_doctor_availability))
        .with_state(state)
}
