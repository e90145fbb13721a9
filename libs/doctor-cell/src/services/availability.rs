use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc, Weekday};
use reqwest::Method;
use serde::Deserialize;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::PostgrestClient;

use crate::models::{AvailableSlot, Doctor, DoctorError};
use crate::services::directory::DoctorService;

/// Bare interval of an existing booking, enough for the overlap test.
#[derive(Debug, Clone, Deserialize)]
struct BookedInterval {
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

pub struct AvailabilityService {
    db: PostgrestClient,
    doctors: DoctorService,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: PostgrestClient::new(config),
            doctors: DoctorService::new(config),
        }
    }

    /// Calculate the bookable slots for a doctor on a given date. Days the
    /// doctor does not work yield an empty list; slots overlapping a
    /// non-cancelled appointment are reported as unavailable.
    pub async fn get_available_slots(
        &self,
        doctor_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<AvailableSlot>, DoctorError> {
        debug!("Calculating available slots for doctor {} on {}", doctor_id, date);

        let doctor = self.doctors.get_doctor(doctor_id).await?;

        if !is_available_on(&doctor, date.weekday()) {
            debug!("Doctor {} is not available on {}", doctor_id, weekday_name(date.weekday()));
            return Ok(vec![]);
        }

        let booked = self.booked_intervals(doctor_id, date).await?;
        let slots = build_slots(&doctor, date, &booked);

        debug!("Found {} slots ({} free)", slots.len(), slots.iter().filter(|s| s.available).count());
        Ok(slots)
    }

    /// Non-cancelled appointments for the doctor starting on the given day.
    async fn booked_intervals(
        &self,
        doctor_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<BookedInterval>, DoctorError> {
        let start_of_day = date.and_hms_opt(0, 0, 0).unwrap().and_utc();
        let end_of_day = start_of_day + Duration::days(1);

        let path = format!(
            "/appointments?doctor_id=eq.{}&status=neq.CANCELLED&start_time=gte.{}&start_time=lt.{}&select=start_time,end_time&order=start_time.asc",
            doctor_id,
            urlencoding::encode(&start_of_day.to_rfc3339()),
            urlencoding::encode(&end_of_day.to_rfc3339())
        );

        self.db
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))
    }
}

pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

pub fn is_available_on(doctor: &Doctor, weekday: Weekday) -> bool {
    let name = weekday_name(weekday);
    doctor.available_days.iter().any(|d| d.eq_ignore_ascii_case(name))
}

/// Walk the doctor's working window in fixed increments, emitting one slot
/// per step whose end still fits the window. Arithmetic is done in minutes
/// since midnight so a window touching midnight cannot wrap.
fn build_slots(doctor: &Doctor, date: NaiveDate, booked: &[BookedInterval]) -> Vec<AvailableSlot> {
    let duration = doctor.appointment_duration_minutes as i64;
    if duration <= 0 {
        return vec![];
    }

    let start_min = (doctor.start_time.hour() * 60 + doctor.start_time.minute()) as i64;
    let end_min = (doctor.end_time.hour() * 60 + doctor.end_time.minute()) as i64;
    let day_start = date.and_hms_opt(0, 0, 0).unwrap().and_utc();

    let mut slots = Vec::new();
    let mut current = start_min;

    while current + duration <= end_min {
        let slot_start = day_start + Duration::minutes(current);
        let slot_end = slot_start + Duration::minutes(duration);

        let is_booked = booked
            .iter()
            .any(|b| slot_start < b.end_time && slot_end > b.start_time);

        slots.push(AvailableSlot {
            start_time: slot_start,
            end_time: slot_end,
            available: !is_booked,
        });

        current += duration;
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use uuid::Uuid;

    fn test_doctor(start: &str, end: &str, duration: i32) -> Doctor {
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
            start_time: NaiveTime::parse_from_str(start, "%H:%M:%S").unwrap(),
            end_time: NaiveTime::parse_from_str(end, "%H:%M:%S").unwrap(),
            appointment_duration_minutes: duration,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    #[test]
    fn full_working_day_yields_consecutive_slots() {
        let doctor = test_doctor("09:00:00", "17:00:00", 30);
        let slots = build_slots(&doctor, monday(), &[]);

        assert_eq!(slots.len(), 16);
        assert!(slots.iter().all(|s| s.available));

        let first = &slots[0];
        assert_eq!(first.start_time, monday().and_hms_opt(9, 0, 0).unwrap().and_utc());
        let last = &slots[15];
        assert_eq!(last.end_time, monday().and_hms_opt(17, 0, 0).unwrap().and_utc());

        // Consecutive, no gaps
        for pair in slots.windows(2) {
            assert_eq!(pair[0].end_time, pair[1].start_time);
        }
    }

    #[test]
    fn partial_trailing_slot_is_dropped() {
        // 09:00-10:45 with 30-minute slots: the 10:30-11:00 slot does not fit
        let doctor = test_doctor("09:00:00", "10:45:00", 30);
        let slots = build_slots(&doctor, monday(), &[]);
        assert_eq!(slots.len(), 3);
    }

    #[test]
    fn booked_interval_marks_overlapping_slots_unavailable() {
        let doctor = test_doctor("09:00:00", "12:00:00", 30);
        let booked = vec![BookedInterval {
            start_time: monday().and_hms_opt(9, 30, 0).unwrap().and_utc(),
            end_time: monday().and_hms_opt(10, 0, 0).unwrap().and_utc(),
        }];

        let slots = build_slots(&doctor, monday(), &booked);
        assert_eq!(slots.len(), 6);
        assert!(slots[0].available);
        assert!(!slots[1].available);
        assert!(slots[2].available);
    }

    #[test]
    fn booking_straddling_two_slots_blocks_both() {
        let doctor = test_doctor("09:00:00", "11:00:00", 30);
        let booked = vec![BookedInterval {
            start_time: monday().and_hms_opt(9, 15, 0).unwrap().and_utc(),
            end_time: monday().and_hms_opt(9, 45, 0).unwrap().and_utc(),
        }];

        let slots = build_slots(&doctor, monday(), &booked);
        assert!(!slots[0].available);
        assert!(!slots[1].available);
        assert!(slots[2].available);
    }

    #[test]
    fn weekday_membership_is_case_insensitive() {
        let mut doctor = test_doctor("09:00:00", "17:00:00", 30);
        doctor.available_days = vec!["monday".to_string()];

        assert!(is_available_on(&doctor, Weekday::Mon));
        assert!(!is_available_on(&doctor, Weekday::Sat));
    }
}
