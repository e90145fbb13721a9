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

use crate::models::{
    Appointment, AppointmentError, CreateAppointmentRequest, DoctorAppointmentsQuery, ScheduleQuery,
    UpdateAppointmentRequest,
};
use crate::services::BookingService;

fn map_appointment_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
        AppointmentError::SlotTaken => {
            AppError::Conflict("Doctor is not available at the selected time slot".to_string())
        }
        AppointmentError::InvalidTime(msg) => AppError::BadRequest(msg),
        AppointmentError::CannotCancel(msg) => AppError::BadRequest(msg),
        AppointmentError::CannotUpdate(msg) => AppError::BadRequest(msg),
        AppointmentError::DatabaseError(msg) => AppError::Database(msg),
    }
}

fn require_admin(user: &AuthUser) -> Result<(), AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }
    Ok(())
}

fn current_user_id(user: &AuthUser) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id).map_err(|_| AppError::Auth("Invalid user id in token".to_string()))
}

/// Only the owning patient or an admin may touch an appointment.
fn require_owner_or_admin(user: &AuthUser, appointment: &Appointment) -> Result<(), AppError> {
    if user.is_admin() || user.is_self(&appointment.patient_id.to_string()) {
        return Ok(());
    }
    Err(AppError::Forbidden(
        "You can only access your own appointments".to_string(),
    ))
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let patient_id = current_user_id(&user)?;

    let service = BookingService::new(&state);
    let appointment = service
        .book_appointment(patient_id, request)
        .await
        .map_err(map_appointment_error)?;

    Ok((StatusCode::CREATED, Json(json!(appointment))))
}

#[axum::debug_handler]
pub async fn list_all_appointments(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = BookingService::new(&state);
    let appointments = service.list_all().await.map_err(map_appointment_error)?;

    Ok(Json(json!(appointments)))
}

#[axum::debug_handler]
pub async fn my_appointments(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let patient_id = current_user_id(&user)?;

    let service = BookingService::new(&state);
    let appointments = service
        .list_patient_appointments(patient_id)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointments)))
}

#[axum::debug_handler]
pub async fn upcoming_appointments(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let patient_id = current_user_id(&user)?;

    let service = BookingService::new(&state);
    let appointments = service
        .upcoming_appointments(patient_id)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointments)))
}

#[axum::debug_handler]
pub async fn doctor_appointments(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<DoctorAppointmentsQuery>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = BookingService::new(&state);
    let appointments = service
        .list_doctor_appointments(doctor_id, query.start_date, query.end_date)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointments)))
}

#[axum::debug_handler]
pub async fn doctor_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<ScheduleQuery>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = BookingService::new(&state);
    let appointments = service
        .doctor_schedule(doctor_id, query.date)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointments)))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&state);
    let appointment = service
        .get_appointment(appointment_id)
        .await
        .map_err(map_appointment_error)?;

    require_owner_or_admin(&user, &appointment)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&state);

    let appointment = service
        .get_appointment(appointment_id)
        .await
        .map_err(map_appointment_error)?;
    require_owner_or_admin(&user, &appointment)?;

    let updated = service
        .update_appointment(appointment_id, request)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(updated)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&state);

    let appointment = service
        .get_appointment(appointment_id)
        .await
        .map_err(map_appointment_error)?;
    require_owner_or_admin(&user, &appointment)?;

    let cancelled = service
        .cancel_appointment(appointment_id)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": cancelled,
        "message": "Appointment cancelled successfully"
    })))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = BookingService::new(&state);
    service
        .delete_appointment(appointment_id)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment deleted successfully"
    })))
}
