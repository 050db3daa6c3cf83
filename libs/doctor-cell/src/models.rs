// libs/doctor-cell/src/models.rs
use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Serde helper for times of day stored as "HH:MM" strings.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M").map_err(serde::de::Error::custom)
    }
}

/// The fixed set of specialties. Declared once and referenced from every
/// layer rather than restated per schema.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Specialty {
    GeneralPractice,
    Cardiology,
    Dermatology,
    Pediatrics,
    Neurology,
    Orthopedics,
    Psychiatry,
    Gynecology,
    Ophthalmology,
    Dentistry,
}

impl fmt::Display for Specialty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Specialty::GeneralPractice => "general-practice",
            Specialty::Cardiology => "cardiology",
            Specialty::Dermatology => "dermatology",
            Specialty::Pediatrics => "pediatrics",
            Specialty::Neurology => "neurology",
            Specialty::Orthopedics => "orthopedics",
            Specialty::Psychiatry => "psychiatry",
            Specialty::Gynecology => "gynecology",
            Specialty::Ophthalmology => "ophthalmology",
            Specialty::Dentistry => "dentistry",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
            DayOfWeek::Sunday => "sunday",
        };
        write!(f, "{}", name)
    }
}

/// One recurring weekly open interval. Multiple slots may exist per day;
/// overlapping slots are allowed and treated independently at query time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailabilitySlot {
    pub day: DayOfWeek,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub specialty: Specialty,
    pub availability: Vec<AvailabilitySlot>,
    pub consultation_fee: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

/// Availability slot as submitted by the admin API. Times arrive as raw
/// "HH:MM" strings and are validated by the service, not by serde.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilitySlotInput {
    pub day: DayOfWeek,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDoctorRequest {
    pub full_name: String,
    pub email: String,
    pub specialty: Specialty,
    pub availability: Vec<AvailabilitySlotInput>,
    pub consultation_fee: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateDoctorRequest {
    pub full_name: Option<String>,
    pub specialty: Option<Specialty>,
    pub availability: Option<Vec<AvailabilitySlotInput>>,
    pub consultation_fee: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoctorSearchFilters {
    pub specialty: Option<Specialty>,
    pub include_inactive: Option<bool>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Doctor has active future appointments")]
    HasActiveAppointments,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl From<shared_database::DbError> for DoctorError {
    fn from(err: shared_database::DbError) -> Self {
        match err {
            shared_database::DbError::NotFound => DoctorError::NotFound,
            shared_database::DbError::Transient(msg) => DoctorError::Unavailable(msg),
            other => DoctorError::Database(other.to_string()),
        }
    }
}
