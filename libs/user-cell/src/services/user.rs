use chrono::Utc;
use regex::Regex;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_database::{DbError, PostgrestClient};

use crate::models::{CreateUserRequest, UpdateUserRequest, User, UserCredentials, UserError};
use crate::services::password;

/// Column list for user reads. The password hash must never leave the
/// credential path, so every other query selects these columns explicitly.
const USER_COLUMNS: &str = "id,name,email,role,phone,date_of_birth,address,created_at,updated_at";
const CREDENTIAL_COLUMNS: &str = "id,name,email,password_hash,role";

pub struct UserService {
    db: PostgrestClient,
}

impl UserService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: PostgrestClient::new(config),
        }
    }

    pub async fn create_user(&self, request: CreateUserRequest) -> Result<User, UserError> {
        debug!("Creating user account for: {}", request.email);

        validate_name(&request.name)?;
        validate_email(&request.email)?;
        validate_password(&request.password)?;

        if self.find_by_email(&request.email).await?.is_some() {
            return Err(UserError::EmailTaken);
        }

        let password_hash = password::hash_password(&request.password)
            .map_err(|e| UserError::Internal(format!("Failed to hash password: {}", e)))?;

        let now = Utc::now();
        let user_data = json!({
            "name": request.name,
            "email": request.email,
            "password_hash": password_hash,
            "role": request.role.unwrap_or_default(),
            "phone": request.phone,
            "date_of_birth": request.date_of_birth,
            "address": request.address,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let result: Vec<User> = self
            .db
            .request_returning(Method::POST, "/users", Some(user_data))
            .await
            .map_err(map_db_error)?;

        let user = result
            .into_iter()
            .next()
            .ok_or_else(|| UserError::DatabaseError("Failed to create user".to_string()))?;

        debug!("User account created with ID: {}", user.id);
        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, UserError> {
        let path = format!("/users?select={}&order=created_at.asc", USER_COLUMNS);
        self.db
            .request(Method::GET, &path, None)
            .await
            .map_err(map_db_error)
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User, UserError> {
        debug!("Fetching user: {}", user_id);

        let path = format!("/users?id=eq.{}&select={}", user_id, USER_COLUMNS);
        let result: Vec<User> = self
            .db
            .request(Method::GET, &path, None)
            .await
            .map_err(map_db_error)?;

        result.into_iter().next().ok_or(UserError::NotFound)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserError> {
        let path = format!(
            "/users?email=eq.{}&select={}",
            urlencoding::encode(email),
            USER_COLUMNS
        );
        let result: Vec<User> = self
            .db
            .request(Method::GET, &path, None)
            .await
            .map_err(map_db_error)?;

        Ok(result.into_iter().next())
    }

    /// Look up a user by email and verify the password against the stored
    /// argon2 hash. Lookup failure and password mismatch are deliberately
    /// indistinguishable to the caller.
    pub async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserCredentials, UserError> {
        let path = format!(
            "/users?email=eq.{}&select={}",
            urlencoding::encode(email),
            CREDENTIAL_COLUMNS
        );
        let result: Vec<UserCredentials> = self
            .db
            .request(Method::GET, &path, None)
            .await
            .map_err(map_db_error)?;

        let credentials = result.into_iter().next().ok_or(UserError::InvalidCredentials)?;

        let valid = password::verify_password(password, &credentials.password_hash)
            .map_err(|e| UserError::Internal(format!("Password verification failed: {}", e)))?;

        if !valid {
            return Err(UserError::InvalidCredentials);
        }

        Ok(credentials)
    }

    pub async fn update_user(&self, user_id: &str, request: UpdateUserRequest) -> Result<User, UserError> {
        debug!("Updating user: {}", user_id);

        let current = self.get_user(user_id).await?;

        let mut update_data = serde_json::Map::new();

        if let Some(name) = request.name {
            validate_name(&name)?;
            update_data.insert("name".to_string(), json!(name));
        }
        if let Some(email) = request.email {
            validate_email(&email)?;
            if email != current.email && self.find_by_email(&email).await?.is_some() {
                return Err(UserError::EmailTaken);
            }
            update_data.insert("email".to_string(), json!(email));
        }
        if let Some(new_password) = request.password {
            validate_password(&new_password)?;
            let password_hash = password::hash_password(&new_password)
                .map_err(|e| UserError::Internal(format!("Failed to hash password: {}", e)))?;
            update_data.insert("password_hash".to_string(), json!(password_hash));
        }
        if let Some(phone) = request.phone {
            update_data.insert("phone".to_string(), json!(phone));
        }
        if let Some(date_of_birth) = request.date_of_birth {
            update_data.insert("date_of_birth".to_string(), json!(date_of_birth));
        }
        if let Some(address) = request.address {
            update_data.insert("address".to_string(), json!(address));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/users?id=eq.{}&select={}", user_id, USER_COLUMNS);
        let result: Vec<User> = self
            .db
            .request_returning(Method::PATCH, &path, Some(Value::Object(update_data)))
            .await
            .map_err(map_db_error)?;

        result.into_iter().next().ok_or(UserError::NotFound)
    }

    /// Hard delete, per the account removal policy.
    pub async fn delete_user(&self, user_id: &str) -> Result<(), UserError> {
        debug!("Deleting user: {}", user_id);

        self.get_user(user_id).await?;

        let path = format!("/users?id=eq.{}", user_id);
        self.db
            .execute(Method::DELETE, &path, None)
            .await
            .map_err(map_db_error)?;

        Ok(())
    }
}

fn map_db_error(e: DbError) -> UserError {
    match e {
        // Unique email constraint; the pre-check races with concurrent inserts
        DbError::Conflict(_) => UserError::EmailTaken,
        other => UserError::DatabaseError(other.to_string()),
    }
}

fn validate_name(name: &str) -> Result<(), UserError> {
    if name.trim().is_empty() {
        return Err(UserError::ValidationError("Name must not be empty".to_string()));
    }
    Ok(())
}

pub(crate) fn validate_email(email: &str) -> Result<(), UserError> {
    let email_regex = Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("email pattern is valid");

    if email.len() > 254 || !email_regex.is_match(email) {
        return Err(UserError::ValidationError(format!("Invalid email address: {}", email)));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), UserError> {
    if password.len() < 8 {
        return Err(UserError::ValidationError(
            "Password must be at least 8 characters long".to_string(),
        ));
    }
    Ok(())
}
