use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::models::{AppointmentError, AppointmentStatus};

/// Time- and status-based rules for modifying an existing appointment.
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Cancellation requires an appointment that is neither completed nor
    /// already cancelled, with at least the notice period left before start.
    pub fn validate_cancellation(
        &self,
        status: AppointmentStatus,
        start_time: DateTime<Utc>,
        now: DateTime<Utc>,
        notice_hours: i64,
    ) -> Result<(), AppointmentError> {
        debug!("Validating cancellation for appointment starting {}", start_time);

        match status {
            AppointmentStatus::Completed => {
                return Err(AppointmentError::CannotCancel(
                    "Cannot cancel completed appointments".to_string(),
                ));
            }
            AppointmentStatus::Cancelled => {
                return Err(AppointmentError::CannotCancel(
                    "Appointment is already cancelled".to_string(),
                ));
            }
            _ => {}
        }

        if start_time - now < Duration::hours(notice_hours) {
            return Err(AppointmentError::CannotCancel(format!(
                "Appointments can only be cancelled at least {} hours in advance",
                notice_hours
            )));
        }

        Ok(())
    }

    /// Past appointments are immutable.
    pub fn validate_update(
        &self,
        start_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), AppointmentError> {
        if start_time < now {
            return Err(AppointmentError::CannotUpdate(
                "Cannot update past appointments".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn service() -> AppointmentLifecycleService {
        AppointmentLifecycleService::new()
    }

    #[test]
    fn cancellation_with_enough_notice_is_allowed() {
        let now = Utc::now();
        let start = now + Duration::hours(48);

        assert!(service()
            .validate_cancellation(AppointmentStatus::Scheduled, start, now, 24)
            .is_ok());
        assert!(service()
            .validate_cancellation(AppointmentStatus::Confirmed, start, now, 24)
            .is_ok());
    }

    #[test]
    fn cancellation_at_exactly_the_notice_boundary_is_allowed() {
        let now = Utc::now();
        let start = now + Duration::hours(24);

        assert!(service()
            .validate_cancellation(AppointmentStatus::Scheduled, start, now, 24)
            .is_ok());
    }

    #[test]
    fn late_cancellation_is_rejected() {
        let now = Utc::now();
        let start = now + Duration::hours(23);

        assert_matches!(
            service().validate_cancellation(AppointmentStatus::Scheduled, start, now, 24),
            Err(AppointmentError::CannotCancel(_))
        );
    }

    #[test]
    fn terminal_statuses_cannot_be_cancelled() {
        let now = Utc::now();
        let start = now + Duration::hours(48);

        assert_matches!(
            service().validate_cancellation(AppointmentStatus::Completed, start, now, 24),
            Err(AppointmentError::CannotCancel(_))
        );
        assert_matches!(
            service().validate_cancellation(AppointmentStatus::Cancelled, start, now, 24),
            Err(AppointmentError::CannotCancel(_))
        );
    }

    #[test]
    fn past_appointments_cannot_be_updated() {
        let now = Utc::now();

        assert_matches!(
            service().validate_update(now - Duration::hours(1), now),
            Err(AppointmentError::CannotUpdate(_))
        );
        assert!(service().validate_update(now + Duration::hours(1), now).is_ok());
    }
}
