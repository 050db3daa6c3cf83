// libs/auth-cell/src/handlers.rs
use std::sync::Arc;

use axum::extract::{Extension, Json, State};
use axum::http::HeaderMap;
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::auth::{TokenResponse, User};
use shared_models::error::AppError;
use shared_utils::jwt::validate_token;

fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    if !auth_value.starts_with("Bearer ") {
        return Err(AppError::Auth(
            "Invalid authorization header format".to_string(),
        ));
    }

    Ok(auth_value[7..].to_string())
}

/// Full validation: rejects with 401 on a bad token and echoes back the
/// caller identity on a good one.
pub async fn validate(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = extract_bearer_token(&headers)?;
    let user = validate_token(&token, &config.supabase_jwt_secret).map_err(AppError::Auth)?;

    Ok(Json(TokenResponse {
        valid: true,
        user_id: user.id,
        email: user.email,
        role: user.role,
    }))
}

/// Lightweight check: always 200, with a boolean verdict in the body.
pub async fn verify(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let token = extract_bearer_token(&headers)?;
    let valid = validate_token(&token, &config.supabase_jwt_secret).is_ok();
    Ok(Json(json!({ "valid": valid })))
}

#[axum::debug_handler]
pub async fn get_profile(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    debug!("Fetching profile for user: {}", user.id);

    let client = SupabaseClient::new(&config);
    let profile = client
        .get_user_profile(auth.token())
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(json!({
        "user_id": user.id,
        "profile": profile
    })))
}
