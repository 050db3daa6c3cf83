//! In-memory test doubles for the appointment services.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use appointment_cell::models::{Appointment, AppointmentSearchQuery};
use appointment_cell::services::notify::Notifier;
use appointment_cell::store::AppointmentStore;
use doctor_cell::models::{AvailabilitySlot, DayOfWeek, Doctor, Specialty};
use doctor_cell::services::availability::parse_hhmm;
use shared_database::DbError;

/// In-memory store mirroring the database schema, including the partial
/// unique index over active (doctor_id, date, time) slots. Writes that would
/// violate it fail with `DbError::Conflict`, exactly like the REST layer.
#[derive(Default)]
pub struct InMemoryStore {
    doctors: Mutex<HashMap<Uuid, Doctor>>,
    appointments: Mutex<Vec<Appointment>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_doctor(&self, doctor: Doctor) {
        self.doctors.lock().unwrap().insert(doctor.id, doctor);
    }

    pub fn appointment_count(&self) -> usize {
        self.appointments.lock().unwrap().len()
    }

    fn slot_held(
        appointments: &[Appointment],
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        exclude: Option<Uuid>,
    ) -> Option<Appointment> {
        appointments
            .iter()
            .find(|a| {
                a.doctor_id == doctor_id
                    && a.date == date
                    && a.time == time
                    && a.is_active()
                    && Some(a.id) != exclude
            })
            .cloned()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryStore {
    async fn find_doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, DbError> {
        Ok(self.doctors.lock().unwrap().get(&doctor_id).cloned())
    }

    async fn find_active_appointment(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        exclude: Option<Uuid>,
    ) -> Result<Option<Appointment>, DbError> {
        let appointments = self.appointments.lock().unwrap();
        Ok(Self::slot_held(&appointments, doctor_id, date, time, exclude))
    }

    async fn insert_appointment(&self, appointment: &Appointment) -> Result<Appointment, DbError> {
        let mut appointments = self.appointments.lock().unwrap();
        if appointment.is_active()
            && Self::slot_held(
                &appointments,
                appointment.doctor_id,
                appointment.date,
                appointment.time,
                None,
            )
            .is_some()
        {
            return Err(DbError::Conflict);
        }
        appointments.push(appointment.clone());
        Ok(appointment.clone())
    }

    async fn update_appointment(&self, appointment: &Appointment) -> Result<Appointment, DbError> {
        let mut appointments = self.appointments.lock().unwrap();
        if appointment.is_active()
            && Self::slot_held(
                &appointments,
                appointment.doctor_id,
                appointment.date,
                appointment.time,
                Some(appointment.id),
            )
            .is_some()
        {
            return Err(DbError::Conflict);
        }

        let slot = appointments
            .iter_mut()
            .find(|a| a.id == appointment.id)
            .ok_or(DbError::NotFound)?;
        *slot = appointment.clone();
        Ok(appointment.clone())
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, DbError> {
        Ok(self
            .appointments
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == appointment_id)
            .cloned())
    }

    async fn search_appointments(
        &self,
        query: &AppointmentSearchQuery,
    ) -> Result<Vec<Appointment>, DbError> {
        let appointments = self.appointments.lock().unwrap();
        let mut matches: Vec<Appointment> = appointments
            .iter()
            .filter(|a| query.patient_id.map_or(true, |id| a.patient_id == id))
            .filter(|a| query.doctor_id.map_or(true, |id| a.doctor_id == id))
            .filter(|a| query.status.map_or(true, |s| a.status == s))
            .filter(|a| query.from_date.map_or(true, |d| a.date >= d))
            .filter(|a| query.to_date.map_or(true, |d| a.date <= d))
            .cloned()
            .collect();
        matches.sort_by_key(|a| (a.date, a.time));
        Ok(matches)
    }
}

/// Records every delivered event so tests can assert on dispatch.
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: &str, appointment: &Appointment) {
        self.events
            .lock()
            .unwrap()
            .push(format!("{}:{}", event, appointment.id));
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn appointment_booked(
        &self,
        appointment: &Appointment,
        _doctor: &Doctor,
    ) -> anyhow::Result<()> {
        self.record("booked", appointment);
        Ok(())
    }

    async fn appointment_confirmed(
        &self,
        appointment: &Appointment,
        _doctor: &Doctor,
    ) -> anyhow::Result<()> {
        self.record("confirmed", appointment);
        Ok(())
    }

    async fn appointment_cancelled(
        &self,
        appointment: &Appointment,
        _doctor: &Doctor,
        _reason: &str,
    ) -> anyhow::Result<()> {
        self.record("cancelled", appointment);
        Ok(())
    }
}

/// Fails every delivery. Booking must still succeed.
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn appointment_booked(&self, _: &Appointment, _: &Doctor) -> anyhow::Result<()> {
        anyhow::bail!("webhook unreachable")
    }

    async fn appointment_confirmed(&self, _: &Appointment, _: &Doctor) -> anyhow::Result<()> {
        anyhow::bail!("webhook unreachable")
    }

    async fn appointment_cancelled(&self, _: &Appointment, _: &Doctor, _: &str) -> anyhow::Result<()> {
        anyhow::bail!("webhook unreachable")
    }
}

pub fn t(value: &str) -> NaiveTime {
    parse_hhmm(value).unwrap()
}

/// A doctor open 09:00-17:00 every day of the week.
pub fn doctor_open_all_week() -> Doctor {
    let days = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];
    let now = Utc.with_ymd_and_hms(2026, 9, 1, 8, 0, 0).unwrap();
    Doctor {
        id: Uuid::new_v4(),
        full_name: "Dr. Amara Osei".to_string(),
        email: "amara.osei@example.com".to_string(),
        specialty: Specialty::GeneralPractice,
        availability: days
            .into_iter()
            .map(|day| AvailabilitySlot {
                day,
                start_time: t("09:00"),
                end_time: t("17:00"),
            })
            .collect(),
        consultation_fee: 75.0,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

/// A doctor open only on Mondays, 09:00-12:00.
pub fn doctor_open_monday_mornings() -> Doctor {
    let mut doctor = doctor_open_all_week();
    doctor.availability = vec![AvailabilitySlot {
        day: DayOfWeek::Monday,
        start_time: t("09:00"),
        end_time: t("12:00"),
    }];
    doctor
}

/// Let spawned notification tasks run on the current-thread test runtime.
pub async fn drain_notifications() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
