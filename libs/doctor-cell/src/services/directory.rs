use chrono::{NaiveTime, Utc, Weekday};
use regex::Regex;
use reqwest::Method;
use serde_json::{json, Value};
use serde::Deserialize;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::{DbError, PostgrestClient};

use crate::models::{
    CreateDoctorRequest, Doctor, DoctorError, DoctorListResponse, DoctorQuery, UpdateDoctorRequest,
};

const DEFAULT_PAGE_LIMIT: u32 = 10;
const MIN_SLOT_MINUTES: i32 = 15;
const MAX_SLOT_MINUTES: i32 = 180;

pub struct DoctorService {
    db: PostgrestClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: PostgrestClient::new(config),
        }
    }

    /// Create a new doctor profile (admin operation).
    pub async fn create_doctor(&self, request: CreateDoctorRequest) -> Result<Doctor, DoctorError> {
        debug!("Creating doctor profile for: {}", request.email);

        validate_available_days(&request.available_days)?;
        let start_time = parse_hhmm(&request.start_time)?;
        let end_time = parse_hhmm(&request.end_time)?;
        validate_working_window(start_time, end_time)?;

        let duration = request.appointment_duration_minutes.unwrap_or(30);
        validate_slot_duration(duration)?;

        self.check_uniqueness(&request.email, &request.license_number, None).await?;

        let now = Utc::now();
        let doctor_data = json!({
            "name": request.name,
            "specialization": request.specialization,
            "email": request.email,
            "phone": request.phone,
            "experience_years": request.experience_years,
            "license_number": request.license_number,
            "hospital": request.hospital,
            "bio": request.bio,
            "profile_image": request.profile_image,
            "consultation_fee": request.consultation_fee,
            "available_days": request.available_days,
            "start_time": start_time.format("%H:%M:%S").to_string(),
            "end_time": end_time.format("%H:%M:%S").to_string(),
            "appointment_duration_minutes": duration,
            "is_active": true,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let result: Vec<Doctor> = self
            .db
            .request_returning(Method::POST, "/doctors", Some(doctor_data))
            .await
            .map_err(map_db_error)?;

        let doctor = result
            .into_iter()
            .next()
            .ok_or_else(|| DoctorError::DatabaseError("Failed to create doctor profile".to_string()))?;

        debug!("Doctor profile created with ID: {}", doctor.id);
        Ok(doctor)
    }

    /// List active doctors with optional specialization/search filters and
    /// page-based pagination.
    pub async fn list_doctors(&self, query: DoctorQuery) -> Result<DoctorListResponse, DoctorError> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, 100);
        let offset = (page - 1) * limit;

        let mut path = "/doctors?is_active=eq.true&select=*".to_string();

        if let Some(specialization) = &query.specialization {
            path.push_str(&format!(
                "&specialization=ilike.*{}*",
                urlencoding::encode(specialization)
            ));
        }

        if let Some(search) = &query.search {
            let term = urlencoding::encode(search);
            path.push_str(&format!(
                "&or=(name.ilike.*{term}*,specialization.ilike.*{term}*,hospital.ilike.*{term}*)"
            ));
        }

        path.push_str(&format!("&order=name.asc&limit={}&offset={}", limit, offset));

        let (doctors, total): (Vec<Doctor>, Option<u64>) = self
            .db
            .request_with_count(Method::GET, &path)
            .await
            .map_err(map_db_error)?;

        let total = total.unwrap_or(doctors.len() as u64);
        let total_pages = total.div_ceil(limit as u64);

        Ok(DoctorListResponse {
            doctors,
            total,
            page,
            limit,
            total_pages,
        })
    }

    /// Fetch an active doctor by id.
    pub async fn get_doctor(&self, doctor_id: &str) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor profile: {}", doctor_id);

        let path = format!("/doctors?id=eq.{}&is_active=eq.true", doctor_id);
        let result: Vec<Doctor> = self
            .db
            .request(Method::GET, &path, None)
            .await
            .map_err(map_db_error)?;

        result.into_iter().next().ok_or(DoctorError::NotFound)
    }

    pub async fn update_doctor(
        &self,
        doctor_id: &str,
        request: UpdateDoctorRequest,
    ) -> Result<Doctor, DoctorError> {
        debug!("Updating doctor profile: {}", doctor_id);

        let current = self.get_doctor(doctor_id).await?;

        if let Some(email) = &request.email {
            if *email != current.email {
                self.check_uniqueness(email, &current.license_number, Some(doctor_id)).await?;
            }
        }
        if let Some(license) = &request.license_number {
            if *license != current.license_number {
                self.check_uniqueness(&current.email, license, Some(doctor_id)).await?;
            }
        }

        // Validate the merged working window, not just the provided halves
        let start_time = match &request.start_time {
            Some(raw) => parse_hhmm(raw)?,
            None => current.start_time,
        };
        let end_time = match &request.end_time {
            Some(raw) => parse_hhmm(raw)?,
            None => current.end_time,
        };
        validate_working_window(start_time, end_time)?;

        if let Some(duration) = request.appointment_duration_minutes {
            validate_slot_duration(duration)?;
        }
        if let Some(days) = &request.available_days {
            validate_available_days(days)?;
        }

        let mut update_data = serde_json::Map::new();

        if let Some(name) = request.name {
            update_data.insert("name".to_string(), json!(name));
        }
        if let Some(specialization) = request.specialization {
            update_data.insert("specialization".to_string(), json!(specialization));
        }
        if let Some(email) = request.email {
            update_data.insert("email".to_string(), json!(email));
        }
        if let Some(phone) = request.phone {
            update_data.insert("phone".to_string(), json!(phone));
        }
        if let Some(experience) = request.experience_years {
            update_data.insert("experience_years".to_string(), json!(experience));
        }
        if let Some(license) = request.license_number {
            update_data.insert("license_number".to_string(), json!(license));
        }
        if let Some(hospital) = request.hospital {
            update_data.insert("hospital".to_string(), json!(hospital));
        }
        if let Some(bio) = request.bio {
            update_data.insert("bio".to_string(), json!(bio));
        }
        if let Some(profile_image) = request.profile_image {
            update_data.insert("profile_image".to_string(), json!(profile_image));
        }
        if let Some(fee) = request.consultation_fee {
            update_data.insert("consultation_fee".to_string(), json!(fee));
        }
        if let Some(days) = request.available_days {
            update_data.insert("available_days".to_string(), json!(days));
        }
        if request.start_time.is_some() {
            update_data.insert(
                "start_time".to_string(),
                json!(start_time.format("%H:%M:%S").to_string()),
            );
        }
        if request.end_time.is_some() {
            update_data.insert(
                "end_time".to_string(),
                json!(end_time.format("%H:%M:%S").to_string()),
            );
        }
        if let Some(duration) = request.appointment_duration_minutes {
            update_data.insert("appointment_duration_minutes".to_string(), json!(duration));
        }
        if let Some(is_active) = request.is_active {
            update_data.insert("is_active".to_string(), json!(is_active));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/doctors?id=eq.{}", doctor_id);
        let result: Vec<Doctor> = self
            .db
            .request_returning(Method::PATCH, &path, Some(Value::Object(update_data)))
            .await
            .map_err(map_db_error)?;

        result.into_iter().next().ok_or(DoctorError::NotFound)
    }

    /// Doctor removal is a soft delete: the profile stays for historical
    /// appointments but disappears from the directory.
    pub async fn deactivate_doctor(&self, doctor_id: &str) -> Result<(), DoctorError> {
        debug!("Deactivating doctor: {}", doctor_id);

        self.get_doctor(doctor_id).await?;

        let path = format!("/doctors?id=eq.{}", doctor_id);
        let update = json!({
            "is_active": false,
            "updated_at": Utc::now().to_rfc3339()
        });
        self.db
            .execute(Method::PATCH, &path, Some(update))
            .await
            .map_err(map_db_error)?;

        Ok(())
    }

    /// Distinct specializations among active doctors.
    pub async fn list_specializations(&self) -> Result<Vec<String>, DoctorError> {
        #[derive(Deserialize)]
        struct Row {
            specialization: String,
        }

        let path = "/doctors?select=specialization&is_active=eq.true";
        let rows: Vec<Row> = self
            .db
            .request(Method::GET, path, None)
            .await
            .map_err(map_db_error)?;

        let mut specializations: Vec<String> = rows.into_iter().map(|r| r.specialization).collect();
        specializations.sort();
        specializations.dedup();
        Ok(specializations)
    }

    async fn check_uniqueness(
        &self,
        email: &str,
        license_number: &str,
        exclude_id: Option<&str>,
    ) -> Result<(), DoctorError> {
        let mut path = format!(
            "/doctors?or=(email.eq.{},license_number.eq.{})&select=id,email,license_number",
            urlencoding::encode(email),
            urlencoding::encode(license_number)
        );
        if let Some(id) = exclude_id {
            path.push_str(&format!("&id=neq.{}", id));
        }

        let existing: Vec<Value> = self
            .db
            .request(Method::GET, &path, None)
            .await
            .map_err(map_db_error)?;

        for row in existing {
            if row["email"].as_str() == Some(email) {
                return Err(DoctorError::EmailTaken);
            }
            if row["license_number"].as_str() == Some(license_number) {
                return Err(DoctorError::LicenseTaken);
            }
        }

        Ok(())
    }
}

fn map_db_error(e: DbError) -> DoctorError {
    match e {
        // A constraint 409 from a raced insert; the message names the constraint
        DbError::Conflict(msg) if msg.contains("license") => DoctorError::LicenseTaken,
        DbError::Conflict(_) => DoctorError::EmailTaken,
        other => DoctorError::DatabaseError(other.to_string()),
    }
}

pub(crate) fn parse_hhmm(raw: &str) -> Result<NaiveTime, DoctorError> {
    let time_regex = Regex::new(r"^([01]?\d|2[0-3]):[0-5]\d$").expect("time pattern is valid");
    if !time_regex.is_match(raw) {
        return Err(DoctorError::InvalidTime(format!(
            "Time must be in HH:MM format, got: {}",
            raw
        )));
    }

    NaiveTime::parse_from_str(&format!("{}:00", raw), "%H:%M:%S")
        .map_err(|_| DoctorError::InvalidTime(format!("Time must be in HH:MM format, got: {}", raw)))
}

fn validate_working_window(start: NaiveTime, end: NaiveTime) -> Result<(), DoctorError> {
    if start >= end {
        return Err(DoctorError::InvalidTime(
            "Start time must be before end time".to_string(),
        ));
    }
    Ok(())
}

fn validate_slot_duration(duration_minutes: i32) -> Result<(), DoctorError> {
    if !(MIN_SLOT_MINUTES..=MAX_SLOT_MINUTES).contains(&duration_minutes) {
        return Err(DoctorError::ValidationError(format!(
            "Appointment duration must be between {} and {} minutes",
            MIN_SLOT_MINUTES, MAX_SLOT_MINUTES
        )));
    }
    Ok(())
}

fn validate_available_days(days: &[String]) -> Result<(), DoctorError> {
    if days.is_empty() {
        return Err(DoctorError::ValidationError(
            "At least one available day is required".to_string(),
        ));
    }
    for day in days {
        if day.parse::<Weekday>().is_err() {
            return Err(DoctorError::ValidationError(format!(
                "Invalid weekday name: {}",
                day
            )));
        }
    }
    Ok(())
}
