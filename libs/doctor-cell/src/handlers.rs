use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use auth_cell::AccessGate;
use shared_models::auth::Role;
use shared_models::error::AppError;

use crate::models::AvailabilityQuery;
use crate::services::availability::AvailabilityCalculator;

#[derive(Clone)]
pub struct DoctorState {
    pub gate: AccessGate,
    pub calculator: Arc<AvailabilityCalculator>,
}

#[axum::debug_handler]
pub async fn get_doctor_availability(
    State(state): State<DoctorState>,
    Path((doctor_id, role)): Path<(Uuid, String)>,
    Query(query): Query<AvailabilityQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let role: Role = role.parse().map_err(AppError::BadRequest)?;
    state.gate.authorize(auth.token(), role)?;

    debug!("Availability requested for doctor {} on {}", doctor_id, query.date);
    let slots = state.calculator.compute(doctor_id, query.date).await;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": query.date,
        "policy": state.calculator.policy().to_string(),
        "availability": slots
    })))
}
