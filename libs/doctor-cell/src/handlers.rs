use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use crate::models::{CreateDoctorRequest, DoctorError, DoctorQuery, SlotsQuery, UpdateDoctorRequest};
use crate::services::{AvailabilityService, DoctorService};

fn map_doctor_error(e: DoctorError) -> AppError {
    match e {
        DoctorError::NotFound => AppError::NotFound("Doctor not found".to_string()),
        DoctorError::EmailTaken => {
            AppError::Conflict("Doctor with this email already exists".to_string())
        }
        DoctorError::LicenseTaken => {
            AppError::Conflict("Doctor with this license number already exists".to_string())
        }
        DoctorError::InvalidTime(msg) => AppError::BadRequest(msg),
        DoctorError::ValidationError(msg) => AppError::BadRequest(msg),
        DoctorError::DatabaseError(msg) => AppError::Database(msg),
    }
}

fn require_admin(user: &AuthUser) -> Result<(), AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }
    Ok(())
}

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<DoctorQuery>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&state);
    let listing = service.list_doctors(query).await.map_err(map_doctor_error)?;

    Ok(Json(json!(listing)))
}

#[axum::debug_handler]
pub async fn get_specializations(
    State(state): State<Arc<AppConfig>>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&state);
    let specializations = service.list_specializations().await.map_err(map_doctor_error)?;

    Ok(Json(json!(specializations)))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&state);
    let doctor = service
        .get_doctor(&doctor_id.to_string())
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&state);
    let slots = service
        .get_available_slots(&doctor_id.to_string(), query.date)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!(slots)))
}

#[axum::debug_handler]
pub async fn create_doctor(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_admin(&user)?;

    let service = DoctorService::new(&state);
    let doctor = service.create_doctor(request).await.map_err(map_doctor_error)?;

    Ok((StatusCode::CREATED, Json(json!(doctor))))
}

#[axum::debug_handler]
pub async fn update_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = DoctorService::new(&state);
    let doctor = service
        .update_doctor(&doctor_id.to_string(), request)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn delete_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = DoctorService::new(&state);
    service
        .deactivate_doctor(&doctor_id.to_string())
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Doctor deactivated successfully"
    })))
}
