use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Timelike, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use doctor_cell::models::{Doctor, DoctorError};
use doctor_cell::services::availability::{is_available_on, weekday_name};
use doctor_cell::services::DoctorService;
use shared_config::AppConfig;
use shared_database::{DbError, PostgrestClient};

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookingRules, CreateAppointmentRequest,
    UpdateAppointmentRequest,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::AppointmentLifecycleService;

pub struct BookingService {
    db: Arc<PostgrestClient>,
    conflicts: ConflictDetectionService,
    lifecycle: AppointmentLifecycleService,
    doctors: DoctorService,
    rules: BookingRules,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        let db = Arc::new(PostgrestClient::new(config));
        Self {
            conflicts: ConflictDetectionService::new(Arc::clone(&db)),
            lifecycle: AppointmentLifecycleService::new(),
            doctors: DoctorService::new(config),
            db,
            rules: BookingRules::default(),
        }
    }

    /// Book an appointment for a patient. Validation order: doctor exists,
    /// times are sane, slot is free, interval fits the doctor's schedule.
    /// The insert itself can still lose a race; the overlap exclusion
    /// constraint then answers 409, which maps back to [`AppointmentError::SlotTaken`].
    pub async fn book_appointment(
        &self,
        patient_id: Uuid,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "Booking appointment for patient {} with doctor {}",
            patient_id, request.doctor_id
        );

        let doctor = self
            .doctors
            .get_doctor(&request.doctor_id.to_string())
            .await
            .map_err(|e| match e {
                DoctorError::NotFound => AppointmentError::DoctorNotFound,
                other => AppointmentError::DatabaseError(other.to_string()),
            })?;

        validate_booking_times(request.start_time, request.end_time, Utc::now(), &self.rules)?;

        if self
            .conflicts
            .has_conflict(request.doctor_id, request.start_time, request.end_time, None)
            .await?
        {
            return Err(AppointmentError::SlotTaken);
        }

        validate_doctor_hours(&doctor, request.start_time, request.end_time)?;

        let now = Utc::now();
        let appointment_data = json!({
            "doctor_id": request.doctor_id,
            "patient_id": patient_id,
            "start_time": request.start_time.to_rfc3339(),
            "end_time": request.end_time.to_rfc3339(),
            "status": AppointmentStatus::Scheduled,
            "reason": request.reason,
            "symptoms": request.symptoms,
            "consultation_fee": doctor.consultation_fee,
            "patient_arrived": false,
            "reminder_sent": false,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let result: Vec<Appointment> = self
            .db
            .request_returning(Method::POST, "/appointments", Some(appointment_data))
            .await
            .map_err(|e| match e {
                DbError::Conflict(_) => AppointmentError::SlotTaken,
                other => AppointmentError::DatabaseError(other.to_string()),
            })?;

        let appointment = result
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::DatabaseError("Failed to create appointment".to_string()))?;

        info!("Appointment {} booked with doctor {}", appointment.id, doctor.id);
        Ok(appointment)
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);

        let path = format!("/appointments?id=eq.{}", appointment_id);
        let result: Vec<Appointment> = self
            .db
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result.into_iter().next().ok_or(AppointmentError::NotFound)
    }

    pub async fn list_all(&self) -> Result<Vec<Appointment>, AppointmentError> {
        let path = "/appointments?order=start_time.asc";
        self.db
            .request(Method::GET, path, None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }

    pub async fn list_patient_appointments(
        &self,
        patient_id: Uuid,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!("/appointments?patient_id=eq.{}&order=start_time.asc", patient_id);
        self.db
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }

    pub async fn list_doctor_appointments(
        &self,
        doctor_id: Uuid,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut query_parts = vec![format!("doctor_id=eq.{}", doctor_id)];

        if let Some(start) = start_date {
            query_parts.push(format!(
                "start_time=gte.{}",
                urlencoding::encode(&start.to_rfc3339())
            ));
        }
        if let Some(end) = end_date {
            query_parts.push(format!(
                "start_time=lte.{}",
                urlencoding::encode(&end.to_rfc3339())
            ));
        }

        let path = format!("/appointments?{}&order=start_time.asc", query_parts.join("&"));
        self.db
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }

    /// A patient's next scheduled appointments, soonest first.
    pub async fn upcoming_appointments(
        &self,
        patient_id: Uuid,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let now = Utc::now();
        let path = format!(
            "/appointments?patient_id=eq.{}&status=eq.SCHEDULED&start_time=gt.{}&order=start_time.asc&limit=10",
            patient_id,
            urlencoding::encode(&now.to_rfc3339())
        );
        self.db
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }

    /// A doctor's scheduled appointments on a calendar day.
    pub async fn doctor_schedule(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let start_of_day = date.and_hms_opt(0, 0, 0).unwrap().and_utc();
        let end_of_day = start_of_day + Duration::days(1);

        let path = format!(
            "/appointments?doctor_id=eq.{}&status=eq.SCHEDULED&start_time=gte.{}&start_time=lt.{}&order=start_time.asc",
            doctor_id,
            urlencoding::encode(&start_of_day.to_rfc3339()),
            urlencoding::encode(&end_of_day.to_rfc3339())
        );
        self.db
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }

    /// Patch status/notes/reason/symptoms/arrival on a future appointment.
    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Updating appointment: {}", appointment_id);

        let current = self.get_appointment(appointment_id).await?;
        self.lifecycle.validate_update(current.start_time, Utc::now())?;

        let mut update_data = serde_json::Map::new();

        if let Some(status) = request.status {
            update_data.insert("status".to_string(), json!(status));
        }
        if let Some(notes) = request.notes {
            update_data.insert("notes".to_string(), json!(notes));
        }
        if let Some(reason) = request.reason {
            update_data.insert("reason".to_string(), json!(reason));
        }
        if let Some(symptoms) = request.symptoms {
            update_data.insert("symptoms".to_string(), json!(symptoms));
        }
        if let Some(patient_arrived) = request.patient_arrived {
            update_data.insert("patient_arrived".to_string(), json!(patient_arrived));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/appointments?id=eq.{}", appointment_id);
        let result: Vec<Appointment> = self
            .db
            .request_returning(Method::PATCH, &path, Some(Value::Object(update_data)))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result.into_iter().next().ok_or(AppointmentError::NotFound)
    }

    pub async fn cancel_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        debug!("Cancelling appointment: {}", appointment_id);

        let current = self.get_appointment(appointment_id).await?;
        self.lifecycle.validate_cancellation(
            current.status,
            current.start_time,
            Utc::now(),
            self.rules.cancellation_notice_hours,
        )?;

        let path = format!("/appointments?id=eq.{}", appointment_id);
        let update = json!({
            "status": AppointmentStatus::Cancelled,
            "updated_at": Utc::now().to_rfc3339()
        });
        let result: Vec<Appointment> = self
            .db
            .request_returning(Method::PATCH, &path, Some(update))
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let cancelled = result.into_iter().next().ok_or(AppointmentError::NotFound)?;
        info!("Appointment {} cancelled", appointment_id);
        Ok(cancelled)
    }

    /// Hard delete (admin operation).
    pub async fn delete_appointment(&self, appointment_id: Uuid) -> Result<(), AppointmentError> {
        debug!("Deleting appointment: {}", appointment_id);

        self.get_appointment(appointment_id).await?;

        let path = format!("/appointments?id=eq.{}", appointment_id);
        self.db
            .execute(Method::DELETE, &path, None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(())
    }
}

pub(crate) fn validate_booking_times(
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    now: DateTime<Utc>,
    rules: &BookingRules,
) -> Result<(), AppointmentError> {
    if start_time < now {
        return Err(AppointmentError::InvalidTime(
            "Cannot schedule appointments in the past".to_string(),
        ));
    }

    if start_time >= end_time {
        return Err(AppointmentError::InvalidTime(
            "Start time must be before end time".to_string(),
        ));
    }

    let max_start = now
        .checked_add_months(Months::new(rules.max_advance_months))
        .unwrap_or(now + Duration::days(31 * rules.max_advance_months as i64));
    if start_time > max_start {
        return Err(AppointmentError::InvalidTime(format!(
            "Cannot schedule appointments more than {} months in advance",
            rules.max_advance_months
        )));
    }

    let duration_minutes = (end_time - start_time).num_minutes();
    if duration_minutes < rules.min_duration_minutes {
        return Err(AppointmentError::InvalidTime(format!(
            "Appointment must be at least {} minutes long",
            rules.min_duration_minutes
        )));
    }
    if duration_minutes > rules.max_duration_minutes {
        return Err(AppointmentError::InvalidTime(format!(
            "Appointment cannot be longer than {} minutes",
            rules.max_duration_minutes
        )));
    }

    Ok(())
}

/// The interval must fall on an available weekday and fit entirely within
/// the doctor's working window, compared in minutes since midnight.
pub(crate) fn validate_doctor_hours(
    doctor: &Doctor,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> Result<(), AppointmentError> {
    let weekday = start_time.weekday();
    if !is_available_on(doctor, weekday) {
        return Err(AppointmentError::InvalidTime(format!(
            "Doctor is not available on {}",
            weekday_name(weekday)
        )));
    }

    let appointment_start = start_time.hour() * 60 + start_time.minute();
    let appointment_end = end_time.hour() * 60 + end_time.minute();
    let doctor_start = doctor.start_time.hour() * 60 + doctor.start_time.minute();
    let doctor_end = doctor.end_time.hour() * 60 + doctor.end_time.minute();

    if appointment_start < doctor_start || appointment_end > doctor_end {
        return Err(AppointmentError::InvalidTime(format!(
            "Appointment must be within doctor's available hours ({} - {})",
            doctor.start_time.format("%H:%M"),
            doctor.end_time.format("%H:%M")
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::NaiveTime;

    fn rules() -> BookingRules {
        BookingRules::default()
    }

    fn test_doctor() -> Doctor {
        Doctor {
            id: Uuid::new_v4(),
            name: "Dr. Jane Smith".to_string(),
            specialization: "Cardiology".to_string(),
            email: "jane@hospital.com".to_string(),
            phone: "+1234567890".to_string(),
            experience_years: 15,
            license_number: "MD123456".to_string(),
            hospital: "City General Hospital".to_string(),
            bio: None,
            profile_image: None,
            consultation_fee: 150.0,
            available_days: vec![
                "Monday".to_string(),
                "Tuesday".to_string(),
                "Wednesday".to_string(),
                "Thursday".to_string(),
                "Friday".to_string(),
            ],
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            appointment_duration_minutes: 30,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// A Monday at the given wall-clock time, at least a week out.
    fn future_monday_at(hour: u32, minute: u32) -> DateTime<Utc> {
        let mut date = Utc::now().date_naive() + Duration::days(7);
        while date.weekday() != chrono::Weekday::Mon {
            date += Duration::days(1);
        }
        date.and_hms_opt(hour, minute, 0).unwrap().and_utc()
    }

    #[test]
    fn valid_times_pass() {
        let now = Utc::now();
        let start = now + Duration::days(2);
        let end = start + Duration::minutes(30);

        assert!(validate_booking_times(start, end, now, &rules()).is_ok());
    }

    #[test]
    fn past_start_is_rejected() {
        let now = Utc::now();
        let start = now - Duration::hours(1);
        let end = now + Duration::hours(1);

        assert_matches!(
            validate_booking_times(start, end, now, &rules()),
            Err(AppointmentError::InvalidTime(msg)) if msg.contains("past")
        );
    }

    #[test]
    fn inverted_interval_is_rejected() {
        let now = Utc::now();
        let start = now + Duration::days(2);

        assert_matches!(
            validate_booking_times(start, start, now, &rules()),
            Err(AppointmentError::InvalidTime(msg)) if msg.contains("before end time")
        );
        assert_matches!(
            validate_booking_times(start, start - Duration::minutes(30), now, &rules()),
            Err(AppointmentError::InvalidTime(msg)) if msg.contains("before end time")
        );
    }

    #[test]
    fn bookings_beyond_six_months_are_rejected() {
        let now = Utc::now();
        let start = now + Duration::days(200);
        let end = start + Duration::minutes(30);

        assert_matches!(
            validate_booking_times(start, end, now, &rules()),
            Err(AppointmentError::InvalidTime(msg)) if msg.contains("6 months")
        );
    }

    #[test]
    fn duration_bounds_are_enforced() {
        let now = Utc::now();
        let start = now + Duration::days(2);

        assert_matches!(
            validate_booking_times(start, start + Duration::minutes(10), now, &rules()),
            Err(AppointmentError::InvalidTime(msg)) if msg.contains("at least 15")
        );
        assert_matches!(
            validate_booking_times(start, start + Duration::minutes(200), now, &rules()),
            Err(AppointmentError::InvalidTime(msg)) if msg.contains("longer than 180")
        );
        assert!(validate_booking_times(start, start + Duration::minutes(180), now, &rules()).is_ok());
    }

    #[test]
    fn appointment_within_working_hours_passes() {
        let doctor = test_doctor();
        let start = future_monday_at(10, 0);
        let end = start + Duration::minutes(30);

        assert!(validate_doctor_hours(&doctor, start, end).is_ok());
    }

    #[test]
    fn unavailable_weekday_is_rejected() {
        let doctor = test_doctor();
        let monday = future_monday_at(10, 0);
        let saturday = monday + Duration::days(5);

        assert_matches!(
            validate_doctor_hours(&doctor, saturday, saturday + Duration::minutes(30)),
            Err(AppointmentError::InvalidTime(msg)) if msg.contains("Saturday")
        );
    }

    #[test]
    fn interval_outside_working_window_is_rejected() {
        let doctor = test_doctor();

        // Before opening
        let early = future_monday_at(8, 0);
        assert_matches!(
            validate_doctor_hours(&doctor, early, early + Duration::minutes(30)),
            Err(AppointmentError::InvalidTime(msg)) if msg.contains("available hours")
        );

        // Crossing closing time
        let late = future_monday_at(16, 45);
        assert_matches!(
            validate_doctor_hours(&doctor, late, late + Duration::minutes(30)),
            Err(AppointmentError::InvalidTime(msg)) if msg.contains("available hours")
        );

        // Exactly the closing boundary is fine
        let edge = future_monday_at(16, 30);
        assert!(validate_doctor_hours(&doctor, edge, edge + Duration::minutes(30)).is_ok());
    }
}
