// libs/appointment-cell/src/services/lifecycle.rs
//
// The appointment state machine. All status changes, whatever endpoint they
// arrive through, funnel through `transition` so the legality table and the
// timestamp stamping live in exactly one place.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, CancelledBy, MAX_CANCELLATION_REASON_LEN,
};

#[derive(Debug, Clone)]
pub struct CancellationDetails {
    pub reason: String,
    pub cancelled_by: CancelledBy,
}

#[derive(Debug, Clone)]
pub struct TransitionContext {
    pub now: DateTime<Utc>,
    /// Required when transitioning to `Cancelled`, ignored otherwise.
    pub cancellation: Option<CancellationDetails>,
}

impl TransitionContext {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            cancellation: None,
        }
    }

    pub fn cancelling(now: DateTime<Utc>, reason: String, cancelled_by: CancelledBy) -> Self {
        Self {
            now,
            cancellation: Some(CancellationDetails {
                reason,
                cancelled_by,
            }),
        }
    }
}

#[derive(Debug, Default)]
pub struct LifecycleService;

impl LifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// The statuses legally reachable from `from`. Cancelled and completed
    /// are terminal.
    pub fn valid_transitions(from: AppointmentStatus) -> &'static [AppointmentStatus] {
        match from {
            AppointmentStatus::Pending => {
                &[AppointmentStatus::Confirmed, AppointmentStatus::Cancelled]
            }
            AppointmentStatus::Confirmed => {
                &[AppointmentStatus::Completed, AppointmentStatus::Cancelled]
            }
            AppointmentStatus::Cancelled | AppointmentStatus::Completed => &[],
        }
    }

    pub fn validate_transition(
        &self,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        if Self::valid_transitions(from).contains(&to) {
            Ok(())
        } else {
            Err(AppointmentError::InvalidTransition { from, to })
        }
    }

    /// Apply a validated transition in place. Side-effect timestamps are
    /// stamped only when currently unset, so replaying a transition that
    /// already happened never rewrites history.
    pub fn transition(
        &self,
        appointment: &mut Appointment,
        to: AppointmentStatus,
        ctx: &TransitionContext,
    ) -> Result<(), AppointmentError> {
        self.validate_transition(appointment.status, to)?;

        match to {
            AppointmentStatus::Confirmed => {
                appointment.confirmed_at.get_or_insert(ctx.now);
            }
            AppointmentStatus::Completed => {
                appointment.completed_at.get_or_insert(ctx.now);
            }
            AppointmentStatus::Cancelled => {
                let details = ctx
                    .cancellation
                    .as_ref()
                    .ok_or(AppointmentError::MissingCancellationReason)?;
                let reason = details.reason.trim();
                if reason.is_empty() {
                    return Err(AppointmentError::MissingCancellationReason);
                }
                if reason.len() > MAX_CANCELLATION_REASON_LEN {
                    return Err(AppointmentError::Validation(format!(
                        "Cancellation reason must be at most {} characters",
                        MAX_CANCELLATION_REASON_LEN
                    )));
                }
                appointment.cancellation_reason = Some(reason.to_string());
                appointment.cancelled_by = Some(details.cancelled_by);
                appointment.cancelled_at.get_or_insert(ctx.now);
            }
            AppointmentStatus::Pending => {}
        }

        debug!(
            "Appointment {} transitioned {} -> {}",
            appointment.id, appointment.status, to
        );
        appointment.status = to;
        appointment.updated_at = ctx.now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PaymentStatus;
    use assert_matches::assert_matches;
    use chrono::{NaiveDate, NaiveTime};
    use uuid::Uuid;

    fn appointment(status: AppointmentStatus) -> Appointment {
        let now = Utc::now();
        Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2026, 9, 14).unwrap(),
            time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            status,
            reason: "Annual checkup".to_string(),
            notes: None,
            symptoms: vec![],
            consultation_fee: 50.0,
            payment_status: PaymentStatus::Pending,
            cancellation_reason: None,
            cancelled_by: None,
            cancelled_at: None,
            confirmed_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn transition_table_is_closed() {
        use AppointmentStatus::*;
        let all = [Pending, Confirmed, Cancelled, Completed];
        let allowed = [
            (Pending, Confirmed),
            (Pending, Cancelled),
            (Confirmed, Completed),
            (Confirmed, Cancelled),
        ];

        let service = LifecycleService::new();
        for from in all {
            for to in all {
                let result = service.validate_transition(from, to);
                if allowed.contains(&(from, to)) {
                    assert!(result.is_ok(), "{} -> {} should be legal", from, to);
                } else {
                    assert_matches!(
                        result,
                        Err(AppointmentError::InvalidTransition { .. }),
                        "{} -> {} should be rejected",
                        from,
                        to
                    );
                }
            }
        }
    }

    #[test]
    fn confirming_stamps_confirmed_at_once() {
        let service = LifecycleService::new();
        let mut appt = appointment(AppointmentStatus::Pending);
        let first = Utc::now();

        service
            .transition(&mut appt, AppointmentStatus::Confirmed, &TransitionContext::at(first))
            .unwrap();
        assert_eq!(appt.status, AppointmentStatus::Confirmed);
        assert_eq!(appt.confirmed_at, Some(first));

        // A pre-existing stamp survives later transitions.
        let later = first + chrono::Duration::hours(1);
        service
            .transition(&mut appt, AppointmentStatus::Completed, &TransitionContext::at(later))
            .unwrap();
        assert_eq!(appt.confirmed_at, Some(first));
        assert_eq!(appt.completed_at, Some(later));
        assert_eq!(appt.updated_at, later);
    }

    #[test]
    fn cancelling_requires_reason() {
        let service = LifecycleService::new();
        let mut appt = appointment(AppointmentStatus::Pending);
        let now = Utc::now();

        assert_matches!(
            service.transition(&mut appt, AppointmentStatus::Cancelled, &TransitionContext::at(now)),
            Err(AppointmentError::MissingCancellationReason)
        );
        assert_matches!(
            service.transition(
                &mut appt,
                AppointmentStatus::Cancelled,
                &TransitionContext::cancelling(now, "   ".to_string(), CancelledBy::Patient),
            ),
            Err(AppointmentError::MissingCancellationReason)
        );
        // The failed attempts must not have moved the status.
        assert_eq!(appt.status, AppointmentStatus::Pending);
    }

    #[test]
    fn cancelling_records_metadata() {
        let service = LifecycleService::new();
        let mut appt = appointment(AppointmentStatus::Confirmed);
        let now = Utc::now();

        service
            .transition(
                &mut appt,
                AppointmentStatus::Cancelled,
                &TransitionContext::cancelling(now, "Feeling better".to_string(), CancelledBy::Patient),
            )
            .unwrap();

        assert_eq!(appt.status, AppointmentStatus::Cancelled);
        assert_eq!(appt.cancellation_reason.as_deref(), Some("Feeling better"));
        assert_eq!(appt.cancelled_by, Some(CancelledBy::Patient));
        assert_eq!(appt.cancelled_at, Some(now));
    }

    #[test]
    fn cancellation_reason_has_a_length_cap() {
        let service = LifecycleService::new();
        let mut appt = appointment(AppointmentStatus::Pending);
        let now = Utc::now();

        let too_long = "x".repeat(MAX_CANCELLATION_REASON_LEN + 1);
        assert_matches!(
            service.transition(
                &mut appt,
                AppointmentStatus::Cancelled,
                &TransitionContext::cancelling(now, too_long, CancelledBy::Admin),
            ),
            Err(AppointmentError::Validation(_))
        );

        let at_cap = "x".repeat(MAX_CANCELLATION_REASON_LEN);
        service
            .transition(
                &mut appt,
                AppointmentStatus::Cancelled,
                &TransitionContext::cancelling(now, at_cap, CancelledBy::Admin),
            )
            .unwrap();
        assert_eq!(appt.status, AppointmentStatus::Cancelled);
    }

    #[test]
    fn terminal_statuses_reject_everything() {
        let service = LifecycleService::new();
        for terminal in [AppointmentStatus::Cancelled, AppointmentStatus::Completed] {
            let mut appt = appointment(terminal);
            let now = Utc::now();
            assert_matches!(
                service.transition(
                    &mut appt,
                    AppointmentStatus::Cancelled,
                    &TransitionContext::cancelling(now, "again".to_string(), CancelledBy::Admin),
                ),
                Err(AppointmentError::InvalidTransition { .. })
            );
        }
    }
}
