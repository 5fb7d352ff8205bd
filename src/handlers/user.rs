//! User profile request handlers

use axum::{extract::State, response::IntoResponse, Extension, Json};

use crate::error::AppError;
use crate::models::auth::AuthContext;
use crate::models::user::{UpdateUser, User, UserProfile};
use crate::server::AppState;

/// Get the authenticated user's profile
pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    let user = User::find_by_id(&state.db_pool, auth_user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User", auth_user.user_id))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": UserProfile::from(user)
    })))
}

/// Update the authenticated user's profile
pub async fn update_current_user(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthContext>,
    Json(payload): Json<UpdateUser>,
) -> Result<impl IntoResponse, AppError> {
    let user = User::find_by_id(&state.db_pool, auth_user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User", auth_user.user_id))?;

    let updated = user.update(&state.db_pool, payload).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": UserProfile::from(updated)
    })))
}

/// Get the authenticated user's learning statistics
pub async fn get_current_user_stats(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    let stats = User::stats(&state.db_pool, auth_user.user_id).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": stats
    })))
}
