use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Storage outcomes the callers need to tell apart. A unique-constraint
/// violation on insert surfaces as `Conflict`; everything retryable lands in
/// `Transient`.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("row not found")]
    NotFound,

    #[error("uniqueness conflict")]
    Conflict,

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("transient storage failure: {0}")]
    Transient(String),

    #[error("storage API error ({status}): {message}")]
    Api { status: u16, message: String },
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(key) = HeaderValue::from_str(&self.anon_key) {
            headers.insert("apikey", key);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            if let Ok(bearer) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, bearer);
            }
        }

        headers
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, auth_token, body, None)
            .await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, DbError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making request to {}", url);

        let mut headers = self.get_headers(auth_token);
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);
        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req
            .send()
            .await
            .map_err(|e| DbError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("API error ({}): {}", status, error_text);

            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DbError::Auth(error_text),
                StatusCode::NOT_FOUND => DbError::NotFound,
                StatusCode::CONFLICT => DbError::Conflict,
                s if s.is_server_error() => DbError::Transient(error_text),
                s => DbError::Api {
                    status: s.as_u16(),
                    message: error_text,
                },
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| DbError::Transient(e.to_string()))
    }

    pub async fn get_user_profile(&self, auth_token: &str) -> Result<Value, DbError> {
        self.request::<Value>(Method::GET, "/auth/v1/user", Some(auth_token), None)
            .await
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}
