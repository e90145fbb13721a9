use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_rest_url: String,
    pub database_service_token: String,
    pub jwt_secret: String,
    pub token_expiry_hours: i64,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            database_rest_url: env::var("DATABASE_REST_URL")
                .unwrap_or_else(|_| {
                    warn!("DATABASE_REST_URL not set, using empty value");
                    String::new()
                }),
            database_service_token: env::var("DATABASE_SERVICE_TOKEN")
                .unwrap_or_else(|_| {
                    warn!("DATABASE_SERVICE_TOKEN not set, using empty value");
                    String::new()
                }),
            jwt_secret: env::var("APP_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("APP_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            token_expiry_hours: env::var("TOKEN_EXPIRY_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(24),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.database_rest_url.is_empty()
            && !self.database_service_token.is_empty()
            && !self.jwt_secret.is_empty()
    }
}
