use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::PostgrestClient;

use crate::models::AppointmentError;

pub struct ConflictDetectionService {
    db: Arc<PostgrestClient>,
}

impl ConflictDetectionService {
    pub fn new(db: Arc<PostgrestClient>) -> Self {
        Self { db }
    }

    /// Existence check for an overlapping non-cancelled appointment of the
    /// same doctor. Advisory only: the database exclusion constraint is the
    /// authoritative guard against concurrent double-booking.
    pub async fn has_conflict(
        &self,
        doctor_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<bool, AppointmentError> {
        debug!(
            "Checking conflicts for doctor {} from {} to {}",
            doctor_id, start_time, end_time
        );

        let mut query_parts = vec![
            format!("doctor_id=eq.{}", doctor_id),
            "status=neq.CANCELLED".to_string(),
            format!("start_time=lt.{}", urlencoding::encode(&end_time.to_rfc3339())),
            format!("end_time=gt.{}", urlencoding::encode(&start_time.to_rfc3339())),
        ];

        if let Some(exclude_id) = exclude_appointment_id {
            query_parts.push(format!("id=neq.{}", exclude_id));
        }

        let path = format!("/appointments?{}&select=id&limit=1", query_parts.join("&"));

        let result: Vec<Value> = self
            .db
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let has_conflict = !result.is_empty();
        if has_conflict {
            warn!("Conflict detected for doctor {} at {}", doctor_id, start_time);
        }

        Ok(has_conflict)
    }
}

/// Two half-open intervals [start1, end1) and [start2, end2) overlap iff
/// start1 < end2 and start2 < end1.
pub fn intervals_overlap(
    start1: DateTime<Utc>,
    end1: DateTime<Utc>,
    start2: DateTime<Utc>,
    end2: DateTime<Utc>,
) -> bool {
    start1 < end2 && start2 < end1
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, hour, minute, 0).unwrap()
    }

    #[test]
    fn overlapping_intervals_are_detected() {
        assert!(intervals_overlap(at(9, 0), at(10, 0), at(9, 30), at(10, 30)));
        assert!(intervals_overlap(at(9, 30), at(10, 30), at(9, 0), at(10, 0)));
        // Containment
        assert!(intervals_overlap(at(9, 0), at(11, 0), at(9, 30), at(10, 0)));
        assert!(intervals_overlap(at(9, 30), at(10, 0), at(9, 0), at(11, 0)));
    }

    #[test]
    fn touching_intervals_do_not_overlap() {
        assert!(!intervals_overlap(at(9, 0), at(10, 0), at(10, 0), at(11, 0)));
        assert!(!intervals_overlap(at(10, 0), at(11, 0), at(9, 0), at(10, 0)));
    }

    #[test]
    fn disjoint_intervals_do_not_overlap() {
        assert!(!intervals_overlap(at(9, 0), at(10, 0), at(14, 0), at(15, 0)));
    }
}
