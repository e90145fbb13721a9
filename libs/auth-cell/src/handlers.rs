use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
};
use serde_json::json;
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_models::auth::TokenResponse;
use shared_models::error::AppError;
use shared_utils::jwt::{sign_token, validate_token as validate_jwt};
use user_cell::models::{CreateUserRequest, UserError};
use user_cell::services::UserService;

use crate::models::{AuthResponse, AuthenticatedUser, LoginRequest};

// Helper function to extract token
fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    if !auth_value.starts_with("Bearer ") {
        return Err(AppError::Auth("Invalid authorization header format".to_string()));
    }

    Ok(auth_value[7..].to_string())
}

#[axum::debug_handler]
pub async fn register(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    debug!("Registering user: {}", request.email);

    let service = UserService::new(&config);
    let user = service.create_user(request).await.map_err(|e| match e {
        UserError::EmailTaken => AppError::Conflict("User with this email already exists".to_string()),
        UserError::ValidationError(msg) => AppError::BadRequest(msg),
        other => AppError::Internal(other.to_string()),
    })?;

    let access_token = sign_token(
        &user.id.to_string(),
        Some(&user.email),
        Some(&user.role.to_string()),
        &config.jwt_secret,
        config.token_expiry_hours,
    )
    .map_err(AppError::Internal)?;

    info!("User {} registered", user.id);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            access_token,
            user: AuthenticatedUser {
                id: user.id,
                name: user.name,
                email: user.email,
                role: user.role,
            },
        }),
    ))
}

#[axum::debug_handler]
pub async fn login(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    debug!("Login attempt for: {}", request.email);

    let service = UserService::new(&config);
    let credentials = service
        .verify_credentials(&request.email, &request.password)
        .await
        .map_err(|e| match e {
            UserError::InvalidCredentials => AppError::Auth("Invalid credentials".to_string()),
            other => AppError::Internal(other.to_string()),
        })?;

    let access_token = sign_token(
        &credentials.id.to_string(),
        Some(&credentials.email),
        Some(&credentials.role.to_string()),
        &config.jwt_secret,
        config.token_expiry_hours,
    )
    .map_err(AppError::Internal)?;

    Ok(Json(AuthResponse {
        access_token,
        user: AuthenticatedUser {
            id: credentials.id,
            name: credentials.name,
            email: credentials.email,
            role: credentials.role,
        },
    }))
}

#[axum::debug_handler]
pub async fn validate_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = extract_bearer_token(&headers)?;

    match validate_jwt(&token, &config.jwt_secret) {
        Ok(user) => Ok(Json(TokenResponse {
            valid: true,
            user_id: user.id,
            email: user.email,
            role: user.role,
        })),
        Err(err) => Err(AppError::Auth(err)),
    }
}

#[axum::debug_handler]
pub async fn verify_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    debug!("Verifying token");

    let token = extract_bearer_token(&headers)?;

    match validate_jwt(&token, &config.jwt_secret) {
        Ok(_) => Ok(Json(json!({ "valid": true }))),
        Err(_) => Ok(Json(json!({ "valid": false }))),
    }
}
