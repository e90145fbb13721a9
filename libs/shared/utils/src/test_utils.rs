use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::AuthUser;

use crate::jwt::sign_token;

pub struct TestConfig {
    pub jwt_secret: String,
    pub database_rest_url: String,
    pub database_service_token: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            database_rest_url: "http://localhost:3001".to_string(),
            database_service_token: "test-service-token".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_database_url(url: &str) -> AppConfig {
        let mut config = Self::default().to_app_config();
        config.database_rest_url = url.to_string();
        config
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            database_rest_url: self.database_rest_url.clone(),
            database_service_token: self.database_service_token.clone(),
            jwt_secret: self.jwt_secret.clone(),
            token_expiry_hours: 24,
            port: 3000,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: "Test User".to_string(),
            email: "test@example.com".to_string(),
            role: "PATIENT".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: "Test User".to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "PATIENT")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "ADMIN")
    }

    pub fn to_auth_user(&self) -> AuthUser {
        AuthUser {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
        }
    }

    pub fn token(&self, secret: &str) -> String {
        sign_token(&self.id, Some(&self.email), Some(&self.role), secret, 24)
            .expect("test token should sign")
    }
}

/// Canned data-API rows for wiremock-backed tests. Field sets mirror the
/// table schemas in db/schema.sql.
pub struct MockDbResponses;

impl MockDbResponses {
    pub fn user_row(id: &str, name: &str, email: &str, role: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": name,
            "email": email,
            "role": role,
            "phone": null,
            "date_of_birth": null,
            "address": null,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        })
    }

    pub fn credentials_row(
        id: &str,
        name: &str,
        email: &str,
        password_hash: &str,
        role: &str,
    ) -> serde_json::Value {
        json!({
            "id": id,
            "name": name,
            "email": email,
            "password_hash": password_hash,
            "role": role
        })
    }

    pub fn doctor_row(id: &str, name: &str, specialization: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": name,
            "specialization": specialization,
            "email": "doctor@example.com",
            "phone": "+1234567890",
            "experience_years": 10,
            "license_number": "MD123456",
            "hospital": "City General Hospital",
            "bio": null,
            "profile_image": null,
            "consultation_fee": 150.0,
            "available_days": ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"],
            "start_time": "09:00:00",
            "end_time": "17:00:00",
            "appointment_duration_minutes": 30,
            "is_active": true,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        })
    }

    pub fn appointment_row(
        id: &str,
        doctor_id: &str,
        patient_id: &str,
        start_time: &str,
        end_time: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": id,
            "doctor_id": doctor_id,
            "patient_id": patient_id,
            "start_time": start_time,
            "end_time": end_time,
            "status": status,
            "reason": null,
            "notes": null,
            "symptoms": null,
            "consultation_fee": 150.0,
            "patient_arrived": false,
            "reminder_sent": false,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "code": code,
            "message": message
        })
    }
}
