// libs/appointment-cell/src/store.rs
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use doctor_cell::models::Doctor;
use shared_database::{DbError, SupabaseClient};

use crate::models::{Appointment, AppointmentSearchQuery};

/// Persistence seam for appointments. Production talks to Supabase REST;
/// tests substitute an in-memory implementation that enforces the same
/// unique-active-slot constraint the database does.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn find_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DbError>;

    /// The pending or confirmed appointment occupying this exact
    /// (doctor, date, time) slot, if any. `exclude` skips one appointment id,
    /// so a reschedule never collides with itself.
    async fn find_active_appointment(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        exclude: Option<Uuid>,
    ) -> Result<Option<Appointment>, DbError>;

    async fn insert_appointment(&self, appointment: &Appointment) -> Result<Appointment, DbError>;
    async fn update_appointment(&self, appointment: &Appointment) -> Result<Appointment, DbError>;
    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, DbError>;
    async fn search_appointments(
        &self,
        query: &AppointmentSearchQuery,
    ) -> Result<Vec<Appointment>, DbError>;
}

pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
    auth_token: String,
}

impl SupabaseAppointmentStore {
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

    fn one_row(result: Vec<Value>) -> Result<Appointment, DbError> {
        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| DbError::Transient("write returned no representation".to_string()))?;
        serde_json::from_value(row).map_err(|e| DbError::Transient(e.to_string()))
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn find_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DbError> {
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

    async fn find_active_appointment(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        exclude: Option<Uuid>,
    ) -> Result<Option<Appointment>, DbError> {
        let mut path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&date=eq.{}&time=eq.{}&status=in.(pending,confirmed)",
            doctor_id,
            date,
            urlencoding::encode(&time.format("%H:%M").to_string()),
        );
        if let Some(excluded_id) = exclude {
            path.push_str(&format!("&id=neq.{}", excluded_id));
        }

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

    async fn insert_appointment(&self, appointment: &Appointment) -> Result<Appointment, DbError> {
        debug!("Inserting appointment record: {}", appointment.id);

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(&self.auth_token),
                Some(json!(appointment)),
                Some(Self::representation_headers()),
            )
            .await?;

        Self::one_row(result)
    }

    async fn update_appointment(&self, appointment: &Appointment) -> Result<Appointment, DbError> {
        debug!("Updating appointment record: {}", appointment.id);

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment.id);
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(&self.auth_token),
                Some(json!(appointment)),
                Some(Self::representation_headers()),
            )
            .await?;

        let row = result.into_iter().next().ok_or(DbError::NotFound)?;
        serde_json::from_value(row).map_err(|e| DbError::Transient(e.to_string()))
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, DbError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
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

    async fn search_appointments(
        &self,
        query: &AppointmentSearchQuery,
    ) -> Result<Vec<Appointment>, DbError> {
        let mut query_parts = Vec::new();

        if let Some(patient_id) = query.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(doctor_id) = query.doctor_id {
            query_parts.push(format!("doctor_id=eq.{}", doctor_id));
        }
        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(from_date) = query.from_date {
            query_parts.push(format!("date=gte.{}", from_date));
        }
        if let Some(to_date) = query.to_date {
            query_parts.push(format!("date=lte.{}", to_date));
        }

        let mut path = format!(
            "/rest/v1/appointments?{}&order=date.asc,time.asc",
            query_parts.join("&")
        );
        if let Some(limit) = query.limit {
            path.push_str(&format!("&limit={}", limit));
        }
        if let Some(offset) = query.offset {
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
}
