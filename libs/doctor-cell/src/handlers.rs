// libs/doctor-cell/src/handlers.rs
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

use crate::models::{CreateDoctorRequest, DoctorError, DoctorSearchFilters, UpdateDoctorRequest};
use crate::services::doctor::DoctorService;

fn map_doctor_error(err: DoctorError) -> AppError {
    match err {
        DoctorError::NotFound => AppError::NotFound("Doctor not found".to_string()),
        DoctorError::HasActiveAppointments => AppError::Conflict(
            "Doctor has active future appointments and cannot be deactivated".to_string(),
        ),
        DoctorError::Validation(msg) => AppError::BadRequest(msg),
        DoctorError::Unavailable(msg) => AppError::Unavailable(msg),
        DoctorError::Database(msg) => AppError::Database(msg),
    }
}

fn require_admin(user: &User) -> Result<(), AppError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Auth(
            "Administrator role required".to_string(),
        ))
    }
}

#[axum::debug_handler]
pub async fn create_doctor(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = DoctorService::from_config(&state, auth.token());
    let doctor = service
        .create_doctor(request)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::from_config(&state, auth.token());
    let doctor = service
        .get_doctor(doctor_id)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn search_doctors(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(filters): Query<DoctorSearchFilters>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::from_config(&state, auth.token());
    let doctors = service
        .search_doctors(filters)
        .await
        .map_err(map_doctor_error)?;

    let count = doctors.len();
    Ok(Json(json!({
        "doctors": doctors,
        "count": count
    })))
}

#[axum::debug_handler]
pub async fn update_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = DoctorService::from_config(&state, auth.token());
    let doctor = service
        .update_doctor(doctor_id, request)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor
    })))
}

/// Soft delete: marks the doctor inactive, preserving history. Blocked while
/// the doctor still has active future appointments.
#[axum::debug_handler]
pub async fn deactivate_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = DoctorService::from_config(&state, auth.token());
    let doctor = service
        .deactivate_doctor(doctor_id)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor,
        "message": "Doctor deactivated"
    })))
}
