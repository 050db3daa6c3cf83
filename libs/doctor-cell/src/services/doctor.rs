// libs/doctor-cell/src/services/doctor.rs
use chrono::NaiveTime;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_utils::clock::{Clock, SystemClock};

use crate::models::{
    AvailabilitySlot, AvailabilitySlotInput, CreateDoctorRequest, Doctor, DoctorError,
    DoctorSearchFilters, UpdateDoctorRequest,
};
use crate::services::availability::parse_hhmm;
use crate::store::{DoctorStore, SupabaseDoctorStore};

pub struct DoctorService {
    store: Arc<dyn DoctorStore>,
    clock: Arc<dyn Clock>,
}

impl DoctorService {
    pub fn new(store: Arc<dyn DoctorStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn from_config(config: &AppConfig, auth_token: &str) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self::new(
            Arc::new(SupabaseDoctorStore::new(supabase, auth_token)),
            Arc::new(SystemClock),
        )
    }

    /// Create a new doctor profile. The availability list must be non-empty
    /// and every slot must start strictly before it ends.
    pub async fn create_doctor(&self, request: CreateDoctorRequest) -> Result<Doctor, DoctorError> {
        debug!("Creating new doctor profile for: {}", request.email);

        let availability = parse_availability(&request.availability)?;

        if request.consultation_fee < 0.0 {
            return Err(DoctorError::Validation(
                "Consultation fee cannot be negative".to_string(),
            ));
        }
        if request.full_name.trim().is_empty() {
            return Err(DoctorError::Validation("Name is required".to_string()));
        }

        let now = self.clock.now();
        let doctor = Doctor {
            id: Uuid::new_v4(),
            full_name: request.full_name,
            email: request.email,
            specialty: request.specialty,
            availability,
            consultation_fee: request.consultation_fee,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let created = self.store.insert_doctor(&doctor).await?;
        info!("Doctor profile created with ID: {}", created.id);
        Ok(created)
    }

    pub async fn get_doctor(&self, doctor_id: Uuid) -> Result<Doctor, DoctorError> {
        self.store
            .get_doctor(doctor_id)
            .await?
            .ok_or(DoctorError::NotFound)
    }

    pub async fn search_doctors(
        &self,
        filters: DoctorSearchFilters,
    ) -> Result<Vec<Doctor>, DoctorError> {
        Ok(self.store.search_doctors(&filters).await?)
    }

    pub async fn update_doctor(
        &self,
        doctor_id: Uuid,
        request: UpdateDoctorRequest,
    ) -> Result<Doctor, DoctorError> {
        debug!("Updating doctor profile: {}", doctor_id);

        let mut doctor = self.get_doctor(doctor_id).await?;

        if let Some(full_name) = request.full_name {
            if full_name.trim().is_empty() {
                return Err(DoctorError::Validation("Name is required".to_string()));
            }
            doctor.full_name = full_name;
        }
        if let Some(specialty) = request.specialty {
            doctor.specialty = specialty;
        }
        if let Some(slots) = request.availability {
            doctor.availability = parse_availability(&slots)?;
        }
        if let Some(fee) = request.consultation_fee {
            if fee < 0.0 {
                return Err(DoctorError::Validation(
                    "Consultation fee cannot be negative".to_string(),
                ));
            }
            doctor.consultation_fee = fee;
        }
        doctor.updated_at = self.clock.now();

        Ok(self.store.update_doctor(&doctor).await?)
    }

    /// Soft-deactivate a doctor. Rejected while any pending or confirmed
    /// appointment on a future date still references them, so existing
    /// bookings are never silently orphaned.
    pub async fn deactivate_doctor(&self, doctor_id: Uuid) -> Result<Doctor, DoctorError> {
        let mut doctor = self.get_doctor(doctor_id).await?;

        let today = self.clock.now().date_naive();
        let active = self
            .store
            .count_active_future_appointments(doctor_id, today)
            .await?;

        if active > 0 {
            warn!(
                "Refusing to deactivate doctor {} with {} active appointments",
                doctor_id, active
            );
            return Err(DoctorError::HasActiveAppointments);
        }

        doctor.is_active = false;
        doctor.updated_at = self.clock.now();

        let updated = self.store.update_doctor(&doctor).await?;
        info!("Doctor {} deactivated", doctor_id);
        Ok(updated)
    }
}

fn parse_availability(
    inputs: &[AvailabilitySlotInput],
) -> Result<Vec<AvailabilitySlot>, DoctorError> {
    if inputs.is_empty() {
        return Err(DoctorError::Validation(
            "At least one availability slot is required".to_string(),
        ));
    }

    inputs
        .iter()
        .map(|input| {
            let start_time = parse_slot_time(&input.start_time)?;
            let end_time = parse_slot_time(&input.end_time)?;

            if start_time >= end_time {
                return Err(DoctorError::Validation(format!(
                    "Slot start {} must be before end {}",
                    input.start_time, input.end_time
                )));
            }

            Ok(AvailabilitySlot {
                day: input.day,
                start_time,
                end_time,
            })
        })
        .collect()
}

fn parse_slot_time(raw: &str) -> Result<NaiveTime, DoctorError> {
    parse_hhmm(raw)
        .map_err(|_| DoctorError::Validation(format!("Invalid time (expected HH:MM): {}", raw)))
}
