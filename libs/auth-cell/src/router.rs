use axum::{routing::post, Router};

use crate::handlers;
use crate::services::gate::AccessGate;

pub fn auth_routes(gate: AccessGate) -> Router {
    Router::new()
        .route("/validate", post(handlers::validate_token))
        .with_state(gate)
}
