use std::sync::Arc;

use axum::extract::{Json, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::handlers::{login, register, validate_token, verify_token};
use auth_cell::models::LoginRequest;
use shared_models::error::AppError;
use shared_utils::test_utils::{MockDbResponses, TestConfig, TestUser};
use user_cell::models::{CreateUserRequest, UserRole};
use user_cell::services::password::hash_password;

fn create_auth_header(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "authorization",
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
    headers
}

fn register_request(email: &str) -> CreateUserRequest {
    CreateUserRequest {
        name: "Jane Doe".to_string(),
        email: email.to_string(),
        password: "Sup3rSecret!".to_string(),
        role: None,
        phone: None,
        date_of_birth: None,
        address: None,
    }
}

#[tokio::test]
async fn test_register_success() {
    let mock_server = MockServer::start().await;
    let config = Arc::new(TestConfig::with_database_url(&mock_server.uri()));

    let user_id = Uuid::new_v4().to_string();

    // Email uniqueness pre-check finds nothing
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockDbResponses::user_row(&user_id, "Jane Doe", "jane@example.com", "PATIENT")
        ])))
        .mount(&mock_server)
        .await;

    let result = register(
        State(config.clone()),
        Json(register_request("jane@example.com")),
    )
    .await;

    assert!(result.is_ok());
    let (status, response) = result.unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(response.0.user.email, "jane@example.com");
    assert_eq!(response.0.user.role, UserRole::Patient);

    // The issued token must validate against the same secret
    let auth_user =
        shared_utils::jwt::validate_token(&response.0.access_token, &config.jwt_secret).unwrap();
    assert_eq!(auth_user.id, user_id);
    assert_eq!(auth_user.role.as_deref(), Some("PATIENT"));
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let mock_server = MockServer::start().await;
    let config = Arc::new(TestConfig::with_database_url(&mock_server.uri()));

    let existing_id = Uuid::new_v4().to_string();
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDbResponses::user_row(&existing_id, "Jane Doe", "jane@example.com", "PATIENT")
        ])))
        .mount(&mock_server)
        .await;

    let result = register(State(config), Json(register_request("jane@example.com"))).await;

    assert!(result.is_err());
    match result.unwrap_err() {
        AppError::Conflict(msg) => assert_eq!(msg, "User with this email already exists"),
        other => panic!("Expected Conflict error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_register_rejects_short_password() {
    let config = TestConfig::default().to_arc();

    let mut request = register_request("jane@example.com");
    request.password = "short".to_string();

    let result = register(State(config), Json(request)).await;

    assert!(result.is_err());
    match result.unwrap_err() {
        AppError::BadRequest(_) => {}
        other => panic!("Expected BadRequest error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_login_success() {
    let mock_server = MockServer::start().await;
    let config = Arc::new(TestConfig::with_database_url(&mock_server.uri()));

    let user_id = Uuid::new_v4().to_string();
    let password_hash = hash_password("Sup3rSecret!").unwrap();

    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDbResponses::credentials_row(&user_id, "Jane Doe", "jane@example.com", &password_hash, "ADMIN")
        ])))
        .mount(&mock_server)
        .await;

    let result = login(
        State(config.clone()),
        Json(LoginRequest {
            email: "jane@example.com".to_string(),
            password: "Sup3rSecret!".to_string(),
        }),
    )
    .await;

    assert!(result.is_ok());
    let response = result.unwrap().0;
    assert_eq!(response.user.role, UserRole::Admin);

    let auth_user =
        shared_utils::jwt::validate_token(&response.access_token, &config.jwt_secret).unwrap();
    assert!(auth_user.is_admin());
}

#[tokio::test]
async fn test_login_wrong_password() {
    let mock_server = MockServer::start().await;
    let config = Arc::new(TestConfig::with_database_url(&mock_server.uri()));

    let user_id = Uuid::new_v4().to_string();
    let password_hash = hash_password("Sup3rSecret!").unwrap();

    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDbResponses::credentials_row(&user_id, "Jane Doe", "jane@example.com", &password_hash, "PATIENT")
        ])))
        .mount(&mock_server)
        .await;

    let result = login(
        State(config),
        Json(LoginRequest {
            email: "jane@example.com".to_string(),
            password: "not-the-password".to_string(),
        }),
    )
    .await;

    assert!(result.is_err());
    match result.unwrap_err() {
        AppError::Auth(msg) => assert_eq!(msg, "Invalid credentials"),
        other => panic!("Expected Auth error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_login_unknown_email() {
    let mock_server = MockServer::start().await;
    let config = Arc::new(TestConfig::with_database_url(&mock_server.uri()));

    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = login(
        State(config),
        Json(LoginRequest {
            email: "nobody@example.com".to_string(),
            password: "whatever1".to_string(),
        }),
    )
    .await;

    assert!(result.is_err());
    match result.unwrap_err() {
        AppError::Auth(_) => {}
        other => panic!("Expected Auth error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_validate_token_success() {
    let config = TestConfig::default().to_arc();
    let user = TestUser::patient("patient@example.com");
    let token = user.token(&config.jwt_secret);
    let headers = create_auth_header(&token);

    let result = validate_token(State(config), headers).await;

    assert!(result.is_ok());
    let response = result.unwrap().0;
    assert!(response.valid);
    assert_eq!(response.user_id, user.id);
    assert_eq!(response.role, Some("PATIENT".to_string()));
}

#[tokio::test]
async fn test_validate_token_missing_header() {
    let config = TestConfig::default().to_arc();
    let headers = HeaderMap::new();

    let result = validate_token(State(config), headers).await;

    assert!(result.is_err());
    match result.unwrap_err() {
        AppError::Auth(msg) => assert_eq!(msg, "Missing authorization header"),
        other => panic!("Expected Auth error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_validate_token_invalid_format() {
    let config = TestConfig::default().to_arc();
    let mut headers = HeaderMap::new();
    headers.insert("authorization", HeaderValue::from_static("Invalid Token"));

    let result = validate_token(State(config), headers).await;

    assert!(result.is_err());
    match result.unwrap_err() {
        AppError::Auth(msg) => assert_eq!(msg, "Invalid authorization header format"),
        other => panic!("Expected Auth error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_verify_token_valid_and_invalid() {
    let config = TestConfig::default().to_arc();
    let user = TestUser::admin("admin@example.com");

    let good = user.token(&config.jwt_secret);
    let result = verify_token(State(config.clone()), create_auth_header(&good)).await;
    assert_eq!(result.unwrap().0["valid"], true);

    let result = verify_token(State(config), create_auth_header("bad.token.here")).await;
    assert_eq!(result.unwrap().0["valid"], false);
}
