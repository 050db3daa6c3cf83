// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AppointmentError, AppointmentSearchQuery, BookAppointmentRequest, CancelAppointmentRequest,
    Requester, RescheduleAppointmentRequest, UpcomingQuery, UpdateStatusRequest,
};
use crate::services::booking::BookingService;

fn map_appointment_error(err: AppointmentError) -> AppError {
    match err {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
        AppointmentError::DoctorUnavailable => AppError::BadRequest(
            "Doctor is not available at the requested time".to_string(),
        ),
        AppointmentError::SlotTaken => {
            AppError::Conflict("The requested slot is already booked".to_string())
        }
        err @ AppointmentError::InvalidTransition { .. } => AppError::Conflict(err.to_string()),
        err @ AppointmentError::InvalidState(_) => AppError::Conflict(err.to_string()),
        AppointmentError::MissingCancellationReason => {
            AppError::BadRequest("A cancellation reason is required".to_string())
        }
        AppointmentError::CannotCancel => AppError::BadRequest(
            "Appointments can only be cancelled at least 24 hours in advance".to_string(),
        ),
        AppointmentError::AccessDenied => {
            AppError::Auth("Not authorized to access this appointment".to_string())
        }
        AppointmentError::Validation(msg) => AppError::BadRequest(msg),
        AppointmentError::Database(msg) => AppError::Database(msg),
        AppointmentError::Unavailable(msg) => AppError::Unavailable(msg),
    }
}

fn requester_from(user: &User) -> Result<Requester, AppError> {
    let id = Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Invalid subject in token".to_string()))?;
    Ok(Requester {
        id,
        is_admin: user.is_admin(),
    })
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let requester = requester_from(&user)?;

    let service = BookingService::from_config(&state, auth.token());
    let details = service
        .book_appointment(requester.id, request)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": details
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let requester = requester_from(&user)?;

    let service = BookingService::from_config(&state, auth.token());
    let appointment = service
        .get_appointment(appointment_id, requester)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn search_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let requester = requester_from(&user)?;

    let service = BookingService::from_config(&state, auth.token());
    let appointments = service
        .search_appointments(query, requester)
        .await
        .map_err(map_appointment_error)?;

    let count = appointments.len();
    Ok(Json(json!({
        "appointments": appointments,
        "count": count
    })))
}

#[axum::debug_handler]
pub async fn get_upcoming_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<UpcomingQuery>,
) -> Result<Json<Value>, AppError> {
    let requester = requester_from(&user)?;

    let service = BookingService::from_config(&state, auth.token());
    let appointments = service
        .get_upcoming_appointments(requester, query.doctor_id, query.days_ahead.unwrap_or(7))
        .await
        .map_err(map_appointment_error)?;

    let count = appointments.len();
    Ok(Json(json!({
        "appointments": appointments,
        "count": count
    })))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let requester = requester_from(&user)?;

    let service = BookingService::from_config(&state, auth.token());
    let appointment = service
        .update_status(appointment_id, requester, request)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let requester = requester_from(&user)?;

    let service = BookingService::from_config(&state, auth.token());
    let details = service
        .reschedule_appointment(appointment_id, requester, request)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": details
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let requester = requester_from(&user)?;

    let service = BookingService::from_config(&state, auth.token());
    let appointment = service
        .cancel_appointment(appointment_id, requester, request)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled"
    })))
}
