use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use study_db::models::{parse_datetime, UserRow};
use study_types::api::{
    ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest, RegisterRequest,
    ResetPasswordRequest, SimpleMessage, TokenResponse, UpdateProfileRequest, UserResponse,
};

use crate::credentials::{self, RESET_TOKEN_TTL_HOURS};
use crate::error::{ApiError, ApiResult};
use crate::extract::CurrentUser;
use crate::AppState;

/// Storage format for timestamps, matching SQLite's datetime('now').
const SQLITE_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn user_response(user: &UserRow) -> UserResponse {
    UserResponse {
        id: user.id,
        email: user.email.clone(),
        username: user.username.clone(),
        created_at: parse_datetime(&user.created_at),
    }
}

fn validate_email(email: &str) -> ApiResult<()> {
    let valid = email.len() >= 3
        && email.len() <= 255
        && email.split('@').count() == 2
        && !email.starts_with('@')
        && !email.ends_with('@');
    if valid {
        Ok(())
    } else {
        Err(ApiError::bad_request("Invalid email address"))
    }
}

fn validate_username(username: &str) -> ApiResult<()> {
    if (3..=100).contains(&username.chars().count()) {
        Ok(())
    } else {
        Err(ApiError::bad_request(
            "Username must be between 3 and 100 characters",
        ))
    }
}

fn validate_password(password: &str) -> ApiResult<()> {
    if (8..=100).contains(&password.chars().count()) {
        Ok(())
    } else {
        Err(ApiError::bad_request(
            "Password must be between 8 and 100 characters",
        ))
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_email(&req.email)?;
    validate_username(&req.username)?;
    validate_password(&req.password)?;

    if state.db.get_user_by_email(&req.email)?.is_some() {
        return Err(ApiError::bad_request("Email already registered"));
    }

    let password_hash = credentials::hash_password(&req.password)?;
    let user_id = state
        .db
        .create_user(&req.email, &req.username, &password_hash)
        .map_err(|e| ApiError::from_db(e, "Email already registered"))?;

    let user = state
        .db
        .get_user_by_id(user_id)?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("registered user vanished")))?;

    Ok((StatusCode::CREATED, Json(user_response(&user))))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let user = credentials::authenticate(&state.db, &req.email, &req.password)?
        .ok_or_else(|| ApiError::unauthorized("Invalid email or password"))?;

    let access_token = credentials::create_access_token(
        &state.config.secret_key,
        &user.email,
        state.config.token_ttl_minutes,
    )?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        user: user_response(&user),
    }))
}

/// Stateless tokens: logout is a client-side token discard.
pub async fn logout(_user: CurrentUser) -> Json<SimpleMessage> {
    Json(SimpleMessage {
        message: "Successfully logged out".to_string(),
    })
}

pub async fn me(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<UserResponse>> {
    let row = state
        .db
        .get_user_by_id(user.id)?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;
    Ok(Json(user_response(&row)))
}

pub async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<UserResponse>> {
    let row = state
        .db
        .get_user_by_id(user.id)?
        .ok_or_else(|| ApiError::unauthorized("User not found"))?;

    if let Some(username) = &req.username {
        validate_username(username)?;
    }

    let new_hash = match &req.new_password {
        Some(new_password) => {
            let current = req
                .current_password
                .as_deref()
                .ok_or_else(|| ApiError::bad_request("Current password is required"))?;
            if !credentials::verify_password(current, &row.password_hash) {
                return Err(ApiError::bad_request("Current password does not match"));
            }
            validate_password(new_password)?;
            Some(credentials::hash_password(new_password)?)
        }
        None => None,
    };

    state
        .db
        .update_user_profile(user.id, req.username.as_deref(), new_hash.as_deref())?;

    let updated = state
        .db
        .get_user_by_id(user.id)?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("updated user vanished")))?;
    Ok(Json(user_response(&updated)))
}

const GENERIC_RESET_MESSAGE: &str =
    "If the email is registered, a password reset link has been sent.";

/// Always answers with the same generic text whether or not the email is
/// registered; only the internal side effect differs. When no mail relay is
/// configured the link is returned in the body as a development fallback.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> ApiResult<Json<ForgotPasswordResponse>> {
    let Some(user) = state.db.get_user_by_email(&req.email)? else {
        return Ok(Json(ForgotPasswordResponse {
            message: GENERIC_RESET_MESSAGE.to_string(),
            reset_link: None,
        }));
    };

    let token = credentials::generate_reset_token();
    let expires = (Utc::now() + chrono::Duration::hours(RESET_TOKEN_TTL_HOURS))
        .format(SQLITE_DATETIME)
        .to_string();
    state.db.set_reset_token(user.id, &token, &expires)?;

    let reset_link = state.config.reset_link(&token);
    state.mailer.send_password_reset(&user.email, &reset_link).await;

    if state.mailer.is_configured() {
        Ok(Json(ForgotPasswordResponse {
            message: GENERIC_RESET_MESSAGE.to_string(),
            reset_link: None,
        }))
    } else {
        Ok(Json(ForgotPasswordResponse {
            message: "Mail delivery is not configured; use the link below.".to_string(),
            reset_link: Some(reset_link),
        }))
    }
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<Json<SimpleMessage>> {
    let user = state
        .db
        .get_user_by_reset_token(&req.token)?
        .ok_or_else(|| ApiError::bad_request("Invalid or expired token"))?;

    let expired = match user.password_reset_expires.as_deref() {
        Some(raw) => parse_datetime(raw) < Utc::now(),
        None => true,
    };
    if expired {
        // Proactively clear the stale token so it cannot be retried.
        state.db.clear_reset_token(user.id)?;
        return Err(ApiError::bad_request(
            "Token has expired. Please request a new one.",
        ));
    }

    validate_password(&req.new_password)?;
    let password_hash = credentials::hash_password(&req.new_password)?;
    state.db.reset_password(user.id, &password_hash)?;

    Ok(Json(SimpleMessage {
        message: "Password has been reset successfully".to_string(),
    }))
}
