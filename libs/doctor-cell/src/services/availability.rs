// libs/doctor-cell/src/services/availability.rs
//
// Recurring weekly availability. Pure functions of the doctor record and the
// requested day/time; the conflict checker in the appointment cell layers
// existing bookings on top of this.

use chrono::{NaiveTime, ParseResult};

use crate::models::{DayOfWeek, Doctor};

/// Parse a time-of-day in 24-hour "HH:MM" form (hours 0-23, minutes 0-59).
/// Malformed input is a caller error and must be surfaced as a validation
/// failure before any domain logic runs.
pub fn parse_hhmm(value: &str) -> ParseResult<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
}

/// True iff any of the doctor's slots covers `time` on `day`. The interval is
/// half-open: a request exactly at a slot's end time is rejected.
pub fn is_open_at(doctor: &Doctor, day: DayOfWeek, time: NaiveTime) -> bool {
    doctor
        .availability
        .iter()
        .any(|slot| slot.day == day && slot.start_time <= time && time < slot.end_time)
}
