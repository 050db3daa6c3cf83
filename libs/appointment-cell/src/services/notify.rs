// libs/appointment-cell/src/services/notify.rs
//
// Outbound notifications. Strictly best-effort: dispatch happens after the
// appointment write has committed, off the request path, and a delivery
// failure is logged and dropped rather than surfaced to the caller.

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use doctor_cell::models::Doctor;
use shared_config::AppConfig;

use crate::models::Appointment;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn appointment_booked(
        &self,
        appointment: &Appointment,
        doctor: &Doctor,
    ) -> anyhow::Result<()>;

    async fn appointment_confirmed(
        &self,
        appointment: &Appointment,
        doctor: &Doctor,
    ) -> anyhow::Result<()>;

    async fn appointment_cancelled(
        &self,
        appointment: &Appointment,
        doctor: &Doctor,
        reason: &str,
    ) -> anyhow::Result<()>;
}

/// Posts appointment events to the configured webhook. With no webhook URL
/// configured, events are logged and acknowledged.
pub struct WebhookNotifier {
    client: reqwest::Client,
    webhook_url: String,
}

impl WebhookNotifier {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url: config.notification_webhook_url.clone(),
        }
    }

    async fn post_event(&self, event: &str, payload: serde_json::Value) -> anyhow::Result<()> {
        if self.webhook_url.is_empty() {
            debug!("No notification webhook configured, skipping '{}' event", event);
            return Ok(());
        }

        self.client
            .post(&self.webhook_url)
            .json(&json!({ "event": event, "data": payload }))
            .send()
            .await?
            .error_for_status()?;

        info!("Delivered '{}' notification", event);
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn appointment_booked(
        &self,
        appointment: &Appointment,
        doctor: &Doctor,
    ) -> anyhow::Result<()> {
        self.post_event(
            "appointment_booked",
            json!({
                "appointment_id": appointment.id,
                "patient_id": appointment.patient_id,
                "doctor_name": doctor.full_name,
                "date": appointment.date,
                "time": appointment.time.format("%H:%M").to_string(),
            }),
        )
        .await
    }

    async fn appointment_confirmed(
        &self,
        appointment: &Appointment,
        doctor: &Doctor,
    ) -> anyhow::Result<()> {
        self.post_event(
            "appointment_confirmed",
            json!({
                "appointment_id": appointment.id,
                "patient_id": appointment.patient_id,
                "doctor_name": doctor.full_name,
                "date": appointment.date,
                "time": appointment.time.format("%H:%M").to_string(),
            }),
        )
        .await
    }

    async fn appointment_cancelled(
        &self,
        appointment: &Appointment,
        doctor: &Doctor,
        reason: &str,
    ) -> anyhow::Result<()> {
        self.post_event(
            "appointment_cancelled",
            json!({
                "appointment_id": appointment.id,
                "patient_id": appointment.patient_id,
                "doctor_name": doctor.full_name,
                "date": appointment.date,
                "time": appointment.time.format("%H:%M").to_string(),
                "reason": reason,
            }),
        )
        .await
    }
}
