// libs/appointment-cell/src/models.rs
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use doctor_cell::models::{hhmm, Doctor, Specialty};
use shared_database::DbError;

/// Minimum lead time before the appointment start below which a
/// cancellation is refused. The boundary itself is allowed: exactly
/// 24 hours out still cancels.
pub const CANCELLATION_WINDOW_HOURS: i64 = 24;

pub const MAX_REASON_LEN: usize = 500;
pub const MAX_NOTES_LEN: usize = 1000;
pub const MAX_CANCELLATION_REASON_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    Patient,
    Doctor,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    pub reason: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    /// Fee snapshot taken from the doctor profile at booking time, so a
    /// later fee change never alters an existing appointment.
    pub consultation_fee: f64,
    pub payment_status: PaymentStatus,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<CancelledBy>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Start of the appointment as a UTC instant. Wall-clock date and time
    /// are stored timezone-naive and interpreted as UTC.
    pub fn date_time(&self) -> DateTime<Utc> {
        self.date.and_time(self.time).and_utc()
    }

    /// Pending or confirmed, i.e. still occupying its slot.
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            AppointmentStatus::Pending | AppointmentStatus::Confirmed
        )
    }

    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.date_time() > now
    }

    /// Derived, never stored: recomputed from status and start time on
    /// every call so the answer cannot go stale.
    pub fn can_be_cancelled(&self, now: DateTime<Utc>) -> bool {
        self.is_active()
            && self.date_time() - now >= Duration::hours(CANCELLATION_WINDOW_HOURS)
    }
}

/// Appointment joined with the doctor fields clients render next to it.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentDetails {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub doctor_name: String,
    pub doctor_specialty: Specialty,
}

impl AppointmentDetails {
    pub fn new(appointment: Appointment, doctor: &Doctor) -> Self {
        Self {
            appointment,
            doctor_name: doctor.full_name.clone(),
            doctor_specialty: doctor.specialty,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    /// Wall-clock time in "HH:MM" form; parsed and validated by the service.
    pub time: String,
    pub reason: String,
    pub notes: Option<String>,
    pub symptoms: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub date: NaiveDate,
    pub time: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelAppointmentRequest {
    pub cancellation_reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
    pub cancellation_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentSearchQuery {
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpcomingQuery {
    pub doctor_id: Option<Uuid>,
    pub days_ahead: Option<u32>,
}

/// Identity of the caller as seen by the appointment services, extracted
/// from the verified JWT in the handler layer.
#[derive(Debug, Clone, Copy)]
pub struct Requester {
    pub id: Uuid,
    pub is_admin: bool,
}

impl Requester {
    pub fn can_access(&self, appointment: &Appointment) -> bool {
        self.is_admin || appointment.patient_id == self.id
    }

    pub fn canceller_role(&self) -> CancelledBy {
        if self.is_admin {
            CancelledBy::Admin
        } else {
            CancelledBy::Patient
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,
    #[error("Doctor not found")]
    DoctorNotFound,
    #[error("Doctor is not available at the requested time")]
    DoctorUnavailable,
    #[error("The requested slot is already booked")]
    SlotTaken,
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },
    #[error("Appointment cannot be modified in status {0}")]
    InvalidState(AppointmentStatus),
    #[error("A cancellation reason is required")]
    MissingCancellationReason,
    #[error("Appointment can no longer be cancelled")]
    CannotCancel,
    #[error("Not authorized to access this appointment")]
    AccessDenied,
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl From<DbError> for AppointmentError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => AppointmentError::NotFound,
            // The partial unique index on active (doctor_id, date, time)
            // surfaces as a 409 when the advisory check raced another writer.
            DbError::Conflict => AppointmentError::SlotTaken,
            DbError::Transient(msg) => AppointmentError::Unavailable(msg),
            other => AppointmentError::Database(other.to_string()),
        }
    }
}
