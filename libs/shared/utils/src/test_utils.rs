//! Shared helpers for cell test suites.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;

use shared_config::AppConfig;

use crate::clock::Clock;

pub const TEST_JWT_SECRET: &str = "test-jwt-secret-for-unit-tests";

/// Build an [`AppConfig`] pointing at a mock server (wiremock) base URL.
pub fn test_config(base_url: &str) -> AppConfig {
    AppConfig {
        supabase_url: base_url.to_string(),
        supabase_anon_key: "test-anon-key".to_string(),
        supabase_jwt_secret: TEST_JWT_SECRET.to_string(),
        notification_webhook_url: String::new(),
        port: 0,
    }
}

#[derive(Serialize)]
struct TestClaims {
    sub: String,
    exp: u64,
    iat: u64,
    email: Option<String>,
    role: Option<String>,
}

/// Mint a signed HS256 token for a test user, valid for one hour.
pub fn mint_token(user_id: &str, role: &str) -> String {
    let now = Utc::now();
    let claims = TestClaims {
        sub: user_id.to_string(),
        exp: (now + Duration::hours(1)).timestamp() as u64,
        iat: now.timestamp() as u64,
        email: Some(format!("{}@example.com", user_id)),
        role: Some(role.to_string()),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("test token encoding cannot fail")
}

/// Deterministic clock for boundary tests (booking in the past, the 24-hour
/// cancellation window).
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap();
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
