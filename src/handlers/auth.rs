//! Authentication request handlers

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::error::AppError;
use crate::models::auth::{AuthContext, PasswordUtils};
use crate::models::user::{CreateUser, LoginRequest, LoginResponse, User, UserProfile};
use crate::models::UserRole;
use crate::server::AppState;

/// Registration request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 30))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    pub password: String,
    #[validate(length(min = 1, max = 100))]
    pub display_name: String,
}

/// Token refresh request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Register a new account. Everyone starts as a learner; roles are
/// promoted by an admin afterwards.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    PasswordUtils::validate_password_strength(&payload.password)?;

    if User::find_by_username(&state.db_pool, &payload.username)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("Username already taken".to_string()));
    }

    if User::find_by_email(&state.db_pool, &payload.email)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let user = User::create(
        &state.db_pool,
        CreateUser {
            username: payload.username,
            email: payload.email,
            password: payload.password,
            display_name: payload.display_name,
            role: UserRole::Learner,
        },
    )
    .await?;

    let tokens = state.jwt_service.generate_token_pair(&user)?;

    let response = LoginResponse {
        user: UserProfile::from(user),
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_in: tokens.expires_in,
    };

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "data": response
        })),
    ))
}

/// Log in with email and password
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = User::find_by_email(&state.db_pool, &payload.email)
        .await?
        .ok_or_else(|| AppError::Authentication("Invalid email or password".to_string()))?;

    if !user.verify_password(&payload.password) {
        return Err(AppError::Authentication(
            "Invalid email or password".to_string(),
        ));
    }

    if !user.is_active {
        return Err(AppError::Authentication(
            "Account has been deactivated".to_string(),
        ));
    }

    user.update_last_login(&state.db_pool).await?;

    let tokens = state.jwt_service.generate_token_pair(&user)?;

    let response = LoginResponse {
        user: UserProfile::from(user),
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_in: tokens.expires_in,
    };

    Ok(Json(serde_json::json!({
        "success": true,
        "data": response
    })))
}

/// Exchange a refresh token for a fresh token pair
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let claims = state.jwt_service.verify_token(&payload.refresh_token)?;

    let user_id = uuid::Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Authentication("Invalid user ID in token".to_string()))?;

    let user = User::find_by_id(&state.db_pool, user_id)
        .await?
        .ok_or_else(|| AppError::Authentication("User no longer exists".to_string()))?;

    if !user.is_active {
        return Err(AppError::Authentication(
            "Account has been deactivated".to_string(),
        ));
    }

    let tokens = state.jwt_service.generate_token_pair(&user)?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": tokens
    })))
}

/// Log out. Tokens are stateless, so this only acknowledges; clients
/// drop their copy.
pub async fn logout(
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(user_id = %auth_user.user_id, "User logged out");

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Logged out successfully"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_validation() {
        let request = RegisterRequest {
            username: "ab".to_string(),
            email: "not-an-email".to_string(),
            password: "Strongpass1".to_string(),
            display_name: "Test".to_string(),
        };
        assert!(request.validate().is_err());

        let request = RegisterRequest {
            username: "marie".to_string(),
            email: "marie@example.com".to_string(),
            password: "Strongpass1".to_string(),
            display_name: "Marie".to_string(),
        };
        assert!(request.validate().is_ok());
    }
}
