// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::NaiveTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::models::Doctor;
use doctor_cell::services::availability::parse_hhmm;
use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_utils::clock::{Clock, SystemClock};

use crate::models::{
    Appointment, AppointmentDetails, AppointmentError, AppointmentSearchQuery, AppointmentStatus,
    BookAppointmentRequest, CancelAppointmentRequest, PaymentStatus, Requester,
    RescheduleAppointmentRequest, UpdateStatusRequest, MAX_NOTES_LEN, MAX_REASON_LEN,
};
use crate::services::conflict::SlotConflictChecker;
use crate::services::lifecycle::{LifecycleService, TransitionContext};
use crate::services::notify::{Notifier, WebhookNotifier};
use crate::store::{AppointmentStore, SupabaseAppointmentStore};

/// Orchestrates the write paths: booking, reschedule, cancellation and
/// status administration. Validation and conflict checks run before any
/// write; notifications run after, off the request path.
pub struct BookingService {
    store: Arc<dyn AppointmentStore>,
    conflicts: SlotConflictChecker,
    lifecycle: LifecycleService,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl BookingService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            conflicts: SlotConflictChecker::new(Arc::clone(&store)),
            lifecycle: LifecycleService::new(),
            store,
            notifier,
            clock,
        }
    }

    pub fn from_config(config: &AppConfig, auth_token: &str) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self::new(
            Arc::new(SupabaseAppointmentStore::new(supabase, auth_token)),
            Arc::new(WebhookNotifier::new(config)),
            Arc::new(SystemClock),
        )
    }

    /// Book a pending appointment for `patient_id`. The consultation fee is
    /// snapshotted from the doctor profile at this moment.
    pub async fn book_appointment(
        &self,
        patient_id: Uuid,
        request: BookAppointmentRequest,
    ) -> Result<AppointmentDetails, AppointmentError> {
        debug!(
            "Booking request: patient {} with doctor {} on {} {}",
            patient_id, request.doctor_id, request.date, request.time
        );

        let time = parse_time(&request.time)?;
        let reason = validate_reason(&request.reason)?;
        validate_notes(request.notes.as_deref())?;

        let now = self.clock.now();
        if request.date < now.date_naive() {
            return Err(AppointmentError::Validation(
                "Appointment date cannot be in the past".to_string(),
            ));
        }

        let doctor = self
            .store
            .find_doctor(request.doctor_id)
            .await?
            .ok_or(AppointmentError::DoctorNotFound)?;
        if !doctor.is_active {
            return Err(AppointmentError::DoctorUnavailable);
        }

        self.conflicts
            .check_slot(&doctor, request.date, time, None)
            .await?;

        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id: doctor.id,
            date: request.date,
            time,
            status: AppointmentStatus::Pending,
            reason,
            notes: request.notes,
            symptoms: request.symptoms.unwrap_or_default(),
            consultation_fee: doctor.consultation_fee,
            payment_status: PaymentStatus::Pending,
            cancellation_reason: None,
            cancelled_by: None,
            cancelled_at: None,
            confirmed_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };

        // The advisory check above can race a concurrent writer; the unique
        // index over active slots is the final arbiter and comes back as
        // SlotTaken through the DbError mapping.
        let created = self.store.insert_appointment(&appointment).await?;
        info!("Appointment {} booked", created.id);

        self.dispatch_booked(&created, &doctor);
        Ok(AppointmentDetails::new(created, &doctor))
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        requester: Requester,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self
            .store
            .get_appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        if !requester.can_access(&appointment) {
            return Err(AppointmentError::AccessDenied);
        }
        Ok(appointment)
    }

    /// Administrative status change (confirm, complete, cancel). All changes
    /// go through the lifecycle table; nothing here can skip it.
    pub async fn update_status(
        &self,
        appointment_id: Uuid,
        requester: Requester,
        request: UpdateStatusRequest,
    ) -> Result<Appointment, AppointmentError> {
        if !requester.is_admin {
            return Err(AppointmentError::AccessDenied);
        }

        let mut appointment = self
            .store
            .get_appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        let now = self.clock.now();
        let ctx = match request.status {
            AppointmentStatus::Cancelled => TransitionContext::cancelling(
                now,
                request.cancellation_reason.unwrap_or_default(),
                requester.canceller_role(),
            ),
            _ => TransitionContext::at(now),
        };

        self.lifecycle
            .transition(&mut appointment, request.status, &ctx)?;
        let updated = self.store.update_appointment(&appointment).await?;
        info!("Appointment {} status set to {}", updated.id, updated.status);

        if let Ok(Some(doctor)) = self.store.find_doctor(updated.doctor_id).await {
            match updated.status {
                AppointmentStatus::Confirmed => self.dispatch_confirmed(&updated, &doctor),
                AppointmentStatus::Cancelled => self.dispatch_cancelled(&updated, &doctor),
                _ => {}
            }
        }

        Ok(updated)
    }

    /// Move an active appointment to a new slot. The slot checks are the same
    /// as for booking, except the appointment's own slot is excluded so a
    /// no-op reschedule does not conflict with itself.
    pub async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        requester: Requester,
        request: RescheduleAppointmentRequest,
    ) -> Result<AppointmentDetails, AppointmentError> {
        let mut appointment = self
            .store
            .get_appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        if !requester.can_access(&appointment) {
            return Err(AppointmentError::AccessDenied);
        }
        if !appointment.is_active() {
            return Err(AppointmentError::InvalidState(appointment.status));
        }

        let time = parse_time(&request.time)?;
        let now = self.clock.now();
        if request.date < now.date_naive() {
            return Err(AppointmentError::Validation(
                "Appointment date cannot be in the past".to_string(),
            ));
        }

        let doctor = self
            .store
            .find_doctor(appointment.doctor_id)
            .await?
            .ok_or(AppointmentError::DoctorNotFound)?;

        self.conflicts
            .check_slot(&doctor, request.date, time, Some(appointment.id))
            .await?;

        appointment.date = request.date;
        appointment.time = time;
        if let Some(reason) = request.reason {
            appointment.reason = validate_reason(&reason)?;
        }
        appointment.updated_at = now;

        let updated = self.store.update_appointment(&appointment).await?;
        info!(
            "Appointment {} rescheduled to {} {}",
            updated.id, updated.date, updated.time
        );

        self.dispatch_booked(&updated, &doctor);
        Ok(AppointmentDetails::new(updated, &doctor))
    }

    /// Cancel on behalf of the requester. The 24-hour lead-time window
    /// applies to everyone, administrators included.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        requester: Requester,
        request: CancelAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let mut appointment = self
            .store
            .get_appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        if !requester.can_access(&appointment) {
            return Err(AppointmentError::AccessDenied);
        }

        let now = self.clock.now();
        if !appointment.can_be_cancelled(now) {
            warn!(
                "Cancellation refused for appointment {} (status {}, starts {})",
                appointment.id,
                appointment.status,
                appointment.date_time()
            );
            return Err(AppointmentError::CannotCancel);
        }

        let ctx = TransitionContext::cancelling(
            now,
            request.cancellation_reason,
            requester.canceller_role(),
        );
        self.lifecycle
            .transition(&mut appointment, AppointmentStatus::Cancelled, &ctx)?;

        let updated = self.store.update_appointment(&appointment).await?;
        info!("Appointment {} cancelled", updated.id);

        if let Ok(Some(doctor)) = self.store.find_doctor(updated.doctor_id).await {
            self.dispatch_cancelled(&updated, &doctor);
        }
        Ok(updated)
    }

    /// List appointments. Non-admin callers are always scoped to their own
    /// patient id regardless of what the query asks for.
    pub async fn search_appointments(
        &self,
        mut query: AppointmentSearchQuery,
        requester: Requester,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        if !requester.is_admin {
            query.patient_id = Some(requester.id);
        }
        Ok(self.store.search_appointments(&query).await?)
    }

    /// Active appointments starting within the next `days_ahead` days.
    pub async fn get_upcoming_appointments(
        &self,
        requester: Requester,
        doctor_id: Option<Uuid>,
        days_ahead: u32,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let now = self.clock.now();
        let today = now.date_naive();

        let query = AppointmentSearchQuery {
            patient_id: (!requester.is_admin).then_some(requester.id),
            doctor_id,
            status: None,
            from_date: Some(today),
            to_date: Some(today + chrono::Duration::days(i64::from(days_ahead))),
            limit: None,
            offset: None,
        };

        let appointments = self.store.search_appointments(&query).await?;
        Ok(appointments
            .into_iter()
            .filter(|a| a.is_upcoming(now))
            .collect())
    }

    fn dispatch_booked(&self, appointment: &Appointment, doctor: &Doctor) {
        let notifier = Arc::clone(&self.notifier);
        let appointment = appointment.clone();
        let doctor = doctor.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.appointment_booked(&appointment, &doctor).await {
                warn!(
                    "Failed to deliver booking notification for {}: {}",
                    appointment.id, e
                );
            }
        });
    }

    fn dispatch_confirmed(&self, appointment: &Appointment, doctor: &Doctor) {
        let notifier = Arc::clone(&self.notifier);
        let appointment = appointment.clone();
        let doctor = doctor.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.appointment_confirmed(&appointment, &doctor).await {
                warn!(
                    "Failed to deliver confirmation notification for {}: {}",
                    appointment.id, e
                );
            }
        });
    }

    fn dispatch_cancelled(&self, appointment: &Appointment, doctor: &Doctor) {
        let notifier = Arc::clone(&self.notifier);
        let appointment = appointment.clone();
        let doctor = doctor.clone();
        tokio::spawn(async move {
            let reason = appointment.cancellation_reason.clone().unwrap_or_default();
            if let Err(e) = notifier
                .appointment_cancelled(&appointment, &doctor, &reason)
                .await
            {
                warn!(
                    "Failed to deliver cancellation notification for {}: {}",
                    appointment.id, e
                );
            }
        });
    }
}

fn parse_time(raw: &str) -> Result<NaiveTime, AppointmentError> {
    parse_hhmm(raw)
        .map_err(|_| AppointmentError::Validation(format!("Invalid time (expected HH:MM): {}", raw)))
}

fn validate_reason(raw: &str) -> Result<String, AppointmentError> {
    let reason = raw.trim();
    if reason.is_empty() {
        return Err(AppointmentError::Validation(
            "A reason for the visit is required".to_string(),
        ));
    }
    if reason.len() > MAX_REASON_LEN {
        return Err(AppointmentError::Validation(format!(
            "Reason must be at most {} characters",
            MAX_REASON_LEN
        )));
    }
    Ok(reason.to_string())
}

fn validate_notes(notes: Option<&str>) -> Result<(), AppointmentError> {
    if let Some(notes) = notes {
        if notes.len() > MAX_NOTES_LEN {
            return Err(AppointmentError::Validation(format!(
                "Notes must be at most {} characters",
                MAX_NOTES_LEN
            )));
        }
    }
    Ok(())
}
