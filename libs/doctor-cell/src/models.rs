use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub specialization: String,
    pub email: String,
    pub phone: String,
    pub experience_years: i32,
    pub license_number: String,
    pub hospital: String,
    pub bio: Option<String>,
    pub profile_image: Option<String>,
    pub consultation_fee: f64,
    /// Weekday names the doctor takes appointments on, e.g. "Monday".
    pub available_days: Vec<String>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub appointment_duration_minutes: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDoctorRequest {
    pub name: String,
    pub specialization: String,
    pub email: String,
    pub phone: String,
    pub experience_years: i32,
    pub license_number: String,
    pub hospital: String,
    pub bio: Option<String>,
    pub profile_image: Option<String>,
    pub consultation_fee: f64,
    pub available_days: Vec<String>,
    /// HH:MM, e.g. "09:00"
    pub start_time: String,
    /// HH:MM, e.g. "17:00"
    pub end_time: String,
    pub appointment_duration_minutes: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateDoctorRequest {
    pub name: Option<String>,
    pub specialization: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub experience_years: Option<i32>,
    pub license_number: Option<String>,
    pub hospital: Option<String>,
    pub bio: Option<String>,
    pub profile_image: Option<String>,
    pub consultation_fee: Option<f64>,
    pub available_days: Option<Vec<String>>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub appointment_duration_minutes: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoctorQuery {
    pub specialization: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorListResponse {
    pub doctors: Vec<Doctor>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

/// A candidate appointment window within a doctor's working hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailableSlot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub available: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Doctor with this email already exists")]
    EmailTaken,

    #[error("Doctor with this license number already exists")]
    LicenseTaken,

    #[error("Invalid time: {0}")]
    InvalidTime(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
