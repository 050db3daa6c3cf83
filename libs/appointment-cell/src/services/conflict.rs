// libs/appointment-cell/src/services/conflict.rs
use chrono::{Datelike, NaiveDate, NaiveTime};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use doctor_cell::models::{DayOfWeek, Doctor};
use doctor_cell::services::availability;

use crate::models::AppointmentError;
use crate::store::AppointmentStore;

/// Guards a (doctor, date, time) slot before any write. Availability is
/// checked first, then occupancy. The occupancy check is advisory: it gives
/// callers an early, friendly rejection, while the database's partial unique
/// index over active appointments remains the authority under races.
pub struct SlotConflictChecker {
    store: Arc<dyn AppointmentStore>,
}

impl SlotConflictChecker {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    pub async fn check_slot(
        &self,
        doctor: &Doctor,
        date: NaiveDate,
        time: NaiveTime,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<(), AppointmentError> {
        let day = DayOfWeek::from(date.weekday());
        if !availability::is_open_at(doctor, day, time) {
            return Err(AppointmentError::DoctorUnavailable);
        }

        if let Some(existing) = self
            .store
            .find_active_appointment(doctor.id, date, time, exclude_appointment_id)
            .await?
        {
            warn!(
                "Slot {} {} for doctor {} already held by appointment {}",
                date, time, doctor.id, existing.id
            );
            return Err(AppointmentError::SlotTaken);
        }

        Ok(())
    }
}
