use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub symptoms: Option<String>,
    /// The doctor's fee at booking time; later fee changes do not apply.
    pub consultation_fee: f64,
    pub patient_arrived: bool,
    pub reminder_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "SCHEDULED"),
            AppointmentStatus::Confirmed => write!(f, "CONFIRMED"),
            AppointmentStatus::Cancelled => write!(f, "CANCELLED"),
            AppointmentStatus::Completed => write!(f, "COMPLETED"),
            AppointmentStatus::NoShow => write!(f, "NO_SHOW"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAppointmentRequest {
    pub doctor_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub reason: Option<String>,
    pub symptoms: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub status: Option<AppointmentStatus>,
    pub notes: Option<String>,
    pub reason: Option<String>,
    pub symptoms: Option<String>,
    pub patient_arrived: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoctorAppointmentsQuery {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleQuery {
    pub date: NaiveDate,
}

/// Business limits on booking and cancellation.
#[derive(Debug, Clone)]
pub struct BookingRules {
    pub min_duration_minutes: i64,
    pub max_duration_minutes: i64,
    pub max_advance_months: u32,
    pub cancellation_notice_hours: i64,
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            min_duration_minutes: 15,
            max_duration_minutes: 180,
            max_advance_months: 6,
            cancellation_notice_hours: 24,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Doctor is not available at the selected time slot")]
    SlotTaken,

    #[error("Invalid appointment time: {0}")]
    InvalidTime(String),

    #[error("Cannot cancel appointment: {0}")]
    CannotCancel(String),

    #[error("Cannot update appointment: {0}")]
    CannotUpdate(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
