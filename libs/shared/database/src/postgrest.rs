use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Errors surfaced by the PostgREST data API.
///
/// Constraint violations (unique keys, the appointment overlap exclusion
/// constraint) come back as HTTP 409 and are kept distinct so callers can
/// map them to domain conflicts instead of generic failures.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database request failed ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Database transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode database response: {0}")]
    Decode(#[from] serde_json::Error),
}

pub struct PostgrestClient {
    client: Client,
    base_url: String,
    service_token: String,
}

impl PostgrestClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.database_rest_url.clone(),
            service_token: config.database_service_token.clone(),
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.service_token)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }

    /// Issue a request and deserialize the JSON body.
    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        let response = self.send(method, path, body, None).await?;
        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Issue a mutating request with `Prefer: return=representation` so the
    /// affected rows come back in the response body.
    pub async fn request_returning<T>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        let mut extra = HeaderMap::new();
        extra.insert("Prefer", HeaderValue::from_static("return=representation"));

        let response = self.send(method, path, body, Some(extra)).await?;
        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Issue a request with `Prefer: count=exact`, returning the rows plus
    /// the total row count parsed from the `Content-Range` header.
    pub async fn request_with_count<T>(&self, method: Method, path: &str) -> Result<(T, Option<u64>), DbError>
    where
        T: DeserializeOwned,
    {
        let mut extra = HeaderMap::new();
        extra.insert("Prefer", HeaderValue::from_static("count=exact"));

        let response = self.send(method, path, None, Some(extra)).await?;
        let total = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total);
        let data = response.json::<T>().await?;
        Ok((data, total))
    }

    /// Issue a request and discard the response body (DELETE and PATCH
    /// without representation answer 204).
    pub async fn execute(&self, method: Method, path: &str, body: Option<Value>) -> Result<(), DbError> {
        self.send(method, path, body, None).await?;
        Ok(())
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<reqwest::Response, DbError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Data API request: {} {}", method, url);

        let mut headers = self.headers();
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);
        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = extract_error_message(&error_text);
            error!("Data API error ({}): {}", status, message);

            return Err(match status.as_u16() {
                409 => DbError::Conflict(message),
                404 => DbError::NotFound(message),
                code => DbError::Api { status: code, message },
            });
        }

        Ok(response)
    }
}

/// PostgREST error bodies look like `{"code": "...", "message": "..."}`.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| body.to_string())
}

/// `Content-Range: 0-9/42` carries the exact total after the slash.
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.parse().ok()
}
