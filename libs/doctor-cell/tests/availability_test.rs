use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::services::AvailabilityService;
use shared_utils::test_utils::{MockDbResponses, TestConfig};

// Doctor available Monday-Friday 09:00-17:00 with 30-minute slots,
// straight from the canned doctor row.

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
}

fn saturday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 7).unwrap()
}

async fn mount_doctor(server: &MockServer, doctor_id: &str) {
    Mock::given(method("GET"))
        .and(path("/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDbResponses::doctor_row(doctor_id, "Dr. Jane Smith", "Cardiology")
        ])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn monday_yields_sixteen_free_slots() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_database_url(&mock_server.uri());
    let doctor_id = Uuid::new_v4().to_string();

    mount_doctor(&mock_server, &doctor_id).await;
    Mock::given(method("GET"))
        .and(path("/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let service = AvailabilityService::new(&config);
    let slots = service.get_available_slots(&doctor_id, monday()).await.unwrap();

    assert_eq!(slots.len(), 16);
    assert!(slots.iter().all(|s| s.available));
    assert_eq!(
        slots[0].start_time,
        monday().and_hms_opt(9, 0, 0).unwrap().and_utc()
    );
    assert_eq!(
        slots[15].end_time,
        monday().and_hms_opt(17, 0, 0).unwrap().and_utc()
    );
}

#[tokio::test]
async fn saturday_yields_no_slots() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_database_url(&mock_server.uri());
    let doctor_id = Uuid::new_v4().to_string();

    mount_doctor(&mock_server, &doctor_id).await;

    let service = AvailabilityService::new(&config);
    let slots = service.get_available_slots(&doctor_id, saturday()).await.unwrap();

    assert!(slots.is_empty());
}

#[tokio::test]
async fn booked_appointment_marks_slot_unavailable() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_database_url(&mock_server.uri());
    let doctor_id = Uuid::new_v4().to_string();
    let patient_id = Uuid::new_v4().to_string();

    mount_doctor(&mock_server, &doctor_id).await;

    let booked_start = monday().and_hms_opt(10, 0, 0).unwrap().and_utc();
    let booked_end = monday().and_hms_opt(10, 30, 0).unwrap().and_utc();
    Mock::given(method("GET"))
        .and(path("/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockDbResponses::appointment_row(
                &Uuid::new_v4().to_string(),
                &doctor_id,
                &patient_id,
                &booked_start.to_rfc3339(),
                &booked_end.to_rfc3339(),
                "SCHEDULED",
            )
        ])))
        .mount(&mock_server)
        .await;

    let service = AvailabilityService::new(&config);
    let slots = service.get_available_slots(&doctor_id, monday()).await.unwrap();

    assert_eq!(slots.len(), 16);
    let taken: Vec<_> = slots.iter().filter(|s| !s.available).collect();
    assert_eq!(taken.len(), 1);
    assert_eq!(taken[0].start_time, booked_start);
}

#[tokio::test]
async fn unknown_doctor_is_not_found() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_database_url(&mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let service = AvailabilityService::new(&config);
    let result = service
        .get_available_slots(&Uuid::new_v4().to_string(), monday())
        .await;

    assert!(matches!(result, Err(doctor_cell::models::DoctorError::NotFound)));
}
