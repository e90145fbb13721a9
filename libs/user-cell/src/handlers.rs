use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use crate::models::{CreateUserRequest, UpdateUserRequest, UserError};
use crate::services::UserService;

fn map_user_error(e: UserError) -> AppError {
    match e {
        UserError::NotFound => AppError::NotFound("User not found".to_string()),
        UserError::EmailTaken => AppError::Conflict("User with this email already exists".to_string()),
        UserError::InvalidCredentials => AppError::Auth("Invalid credentials".to_string()),
        UserError::ValidationError(msg) => AppError::BadRequest(msg),
        UserError::DatabaseError(msg) => AppError::Database(msg),
        UserError::Internal(msg) => AppError::Internal(msg),
    }
}

fn require_admin(user: &AuthUser) -> Result<(), AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }
    Ok(())
}

#[axum::debug_handler]
pub async fn create_user(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_admin(&user)?;

    let service = UserService::new(&state);
    let created = service.create_user(request).await.map_err(map_user_error)?;

    Ok((StatusCode::CREATED, Json(json!(created))))
}

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = UserService::new(&state);
    let users = service.list_users().await.map_err(map_user_error)?;

    Ok(Json(json!(users)))
}

#[axum::debug_handler]
pub async fn get_profile(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let service = UserService::new(&state);
    let profile = service.get_user(&user.id).await.map_err(map_user_error)?;

    Ok(Json(json!(profile)))
}

#[axum::debug_handler]
pub async fn update_profile(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<Value>, AppError> {
    let service = UserService::new(&state);
    let updated = service
        .update_user(&user.id, request)
        .await
        .map_err(map_user_error)?;

    Ok(Json(json!(updated)))
}

#[axum::debug_handler]
pub async fn get_user(
    State(state): State<Arc<AppConfig>>,
    Path(user_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = UserService::new(&state);
    let found = service
        .get_user(&user_id.to_string())
        .await
        .map_err(map_user_error)?;

    Ok(Json(json!(found)))
}

#[axum::debug_handler]
pub async fn update_user(
    State(state): State<Arc<AppConfig>>,
    Path(user_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = UserService::new(&state);
    let updated = service
        .update_user(&user_id.to_string(), request)
        .await
        .map_err(map_user_error)?;

    Ok(Json(json!(updated)))
}

#[axum::debug_handler]
pub async fn delete_user(
    State(state): State<Arc<AppConfig>>,
    Path(user_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = UserService::new(&state);
    service
        .delete_user(&user_id.to_string())
        .await
        .map_err(map_user_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "User deleted successfully"
    })))
}
