use axum::{
    body::{to_bytes, Body},
    extract::{Json, State},
    http::{HeaderMap, HeaderValue, Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;

use auth_cell::handlers::{validate_token, ValidateRequest};
use auth_cell::router::auth_routes;
use auth_cell::{AccessDecision, AccessGate};
use shared_models::auth::Role;
use shared_models::error::AppError;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn create_gate() -> AccessGate {
    AccessGate::new(TestConfig::default().token_service())
}

fn create_auth_header(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "authorization",
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
    headers
}

fn role_body(role: &str) -> Json<ValidateRequest> {
    Json(ValidateRequest { role: role.to_string() })
}

#[tokio::test]
async fn test_validate_token_success() {
    let config = TestConfig::default();
    let user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));

    let result = validate_token(State(create_gate()), create_auth_header(&token), role_body("patient")).await;

    let response = result.unwrap().0;
    assert!(response.valid);
    assert_eq!(response.user_id, user.id.to_string());
    assert_eq!(response.email, Some(user.email));
    assert_eq!(response.role, Some("patient".to_string()));
}

#[tokio::test]
async fn test_validate_token_wrong_role() {
    let config = TestConfig::default();
    let user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));

    let result = validate_token(State(create_gate()), create_auth_header(&token), role_body("doctor")).await;

    match result {
        Err(AppError::Auth(_)) => {}
        other => panic!("Expected Auth error, got {:?}", other.map(|r| r.0)),
    }
}

#[tokio::test]
async fn test_validate_token_expired() {
    let config = TestConfig::default();
    let user = TestUser::doctor("doctor@example.com");
    let token = JwtTestUtils::create_expired_token(&user, &config.jwt_secret);

    let result = validate_token(State(create_gate()), create_auth_header(&token), role_body("doctor")).await;

    assert!(matches!(result, Err(AppError::Auth(_))));
}

#[tokio::test]
async fn test_validate_token_invalid_signature() {
    let user = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_invalid_signature_token(&user);

    let result = validate_token(State(create_gate()), create_auth_header(&token), role_body("admin")).await;

    assert!(matches!(result, Err(AppError::Auth(_))));
}

#[tokio::test]
async fn test_validate_token_unknown_role_is_bad_request() {
    let config = TestConfig::default();
    let user = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(24));

    let result = validate_token(State(create_gate()), create_auth_header(&token), role_body("Nurse")).await;

    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn test_validate_token_missing_header() {
    let result = validate_token(State(create_gate()), HeaderMap::new(), role_body("patient")).await;

    match result {
        Err(AppError::Auth(msg)) => assert_eq!(msg, "Missing authorization header"),
        _ => panic!("Expected Auth error"),
    }
}

#[tokio::test]
async fn test_gate_exposes_principal_for_ownership_checks() {
    let config = TestConfig::default();
    let tokens = config.token_service();
    let gate = AccessGate::new(tokens.clone());
    let user = TestUser::patient("owner@example.com");

    let token = user.token(tokens.as_ref());

    assert_eq!(gate.validate(&token, Role::Patient), AccessDecision::Authorized(user.to_principal()));
    assert_eq!(gate.validate(&JwtTestUtils::create_malformed_token(), Role::Patient), AccessDecision::Unauthorized);
}

#[tokio::test]
async fn test_validate_route_round_trip() {
    let config = TestConfig::default();
    let user = TestUser::doctor("doctor@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

    let request = Request::builder()
        .method("POST")
        .uri("/validate")
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(json!({ "role": "doctor" }).to_string()))
        .unwrap();

    let response = auth_routes(create_gate()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["valid"], json!(true));
    assert_eq!(value["user_id"], json!(user.id.to_string()));
}

#[tokio::test]
async fn test_validate_route_rejects_without_token() {
    let request = Request::builder()
        .method("POST")
        .uri("/validate")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "role": "patient" }).to_string()))
        .unwrap();

    let response = auth_routes(create_gate()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
