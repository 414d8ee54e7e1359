use axum::{
    extract::{Json, State},
    http::HeaderMap,
};
use serde::Deserialize;
use tracing::debug;

use shared_models::auth::{Role, TokenResponse};
use shared_models::error::AppError;
use shared_utils::extractor::bearer_token;

use crate::services::gate::AccessGate;

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub role: String,
}

#[axum::debug_handler]
pub async fn validate_token(
    State(gate): State<AccessGate>,
    headers: HeaderMap,
    Json(request): Json<ValidateRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token for role {}", request.role);

    let role: Role = request.role.parse().map_err(AppError::BadRequest)?;
    let token = bearer_token(&headers)?;
    let principal = gate.authorize(token, role)?;

    Ok(Json(TokenResponse {
        valid: true,
        user_id: principal.subject,
        email: principal.email,
        role: Some(principal.role.to_string()),
    }))
}
