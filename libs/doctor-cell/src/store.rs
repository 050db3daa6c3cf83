// libs/doctor-cell/src/store.rs
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use shared_database::{DbError, SupabaseClient};

use crate::models::{Doctor, DoctorSearchFilters};

/// Persistence seam for doctor records. Production uses the Supabase REST
/// adapter; tests substitute an in-memory implementation.
#[async_trait]
pub trait DoctorStore: Send + Sync {
    async fn insert_doctor(&self, doctor: &Doctor) -> Result<Doctor, DbError>;
    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DbError>;
    async fn update_doctor(&self, doctor: &Doctor) -> Result<Doctor, DbError>;
    async fn search_doctors(&self, filters: &DoctorSearchFilters) -> Result<Vec<Doctor>, DbError>;

    /// Count of appointments for this doctor with status pending or confirmed
    /// on `today` or later. Used to gate soft-deactivation.
    async fn count_active_future_appointments(
        &self,
        doctor_id: Uuid,
        today: NaiveDate,
    ) -> Result<i64, DbError>;
}

pub struct SupabaseDoctorStore {
    supabase: Arc<SupabaseClient>,
    auth_token: String,
}

impl SupabaseDoctorStore {
    pub fn new(supabase: Arc<SupabaseClient>, auth_token: &str) -> Self {
        Self {
            supabase,
            auth_token: auth_token.to_string(),
        }
    }

    fn representation_headers() -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );
        headers
    }
}

#[async_trait]
impl DoctorStore for SupabaseDoctorStore {
    async fn insert_doctor(&self, doctor: &Doctor) -> Result<Doctor, DbError> {
        debug!("Inserting doctor record: {}", doctor.id);

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/doctors",
                Some(&self.auth_token),
                Some(json!(doctor)),
                Some(Self::representation_headers()),
            )
            .await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| DbError::Transient("insert returned no representation".to_string()))?;

        serde_json::from_value(row).map_err(|e| DbError::Transient(e.to_string()))
    }

    async fn get_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DbError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(&self.auth_token), None)
            .await?;

        match result.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| DbError::Transient(e.to_string())),
            None => Ok(None),
        }
    }

    async fn update_doctor(&self, doctor: &Doctor) -> Result<Doctor, DbError> {
        debug!("Updating doctor record: {}", doctor.id);

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor.id);
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(&self.auth_token),
                Some(json!(doctor)),
                Some(Self::representation_headers()),
            )
            .await?;

        let row = result.into_iter().next().ok_or(DbError::NotFound)?;
        serde_json::from_value(row).map_err(|e| DbError::Transient(e.to_string()))
    }

    async fn search_doctors(&self, filters: &DoctorSearchFilters) -> Result<Vec<Doctor>, DbError> {
        let mut query_parts = Vec::new();

        if let Some(specialty) = filters.specialty {
            query_parts.push(format!("specialty=eq.{}", specialty));
        }
        if !filters.include_inactive.unwrap_or(false) {
            query_parts.push("is_active=eq.true".to_string());
        }

        let mut path = format!(
            "/rest/v1/doctors?{}&order=full_name.asc",
            query_parts.join("&")
        );
        if let Some(limit) = filters.limit {
            path.push_str(&format!("&limit={}", limit));
        }
        if let Some(offset) = filters.offset {
            path.push_str(&format!("&offset={}", offset));
        }

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(&self.auth_token), None)
            .await?;

        result
            .into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| DbError::Transient(e.to_string())))
            .collect()
    }

    async fn count_active_future_appointments(
        &self,
        doctor_id: Uuid,
        today: NaiveDate,
    ) -> Result<i64, DbError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&status=in.(pending,confirmed)&date=gte.{}&select=id",
            doctor_id, today
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(&self.auth_token), None)
            .await?;

        Ok(result.len() as i64)
    }
}
