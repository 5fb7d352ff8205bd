//! Notification request handlers

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::authz::{self, Action, Resource};
use crate::error::AppError;
use crate::models::auth::AuthContext;
use crate::models::course::Course;
use crate::models::enrollment::Enrollment;
use crate::models::notification::{Notification, NotificationFilter};
use crate::models::{NotificationKind, PaginatedResponse, PaginationParams};
use crate::server::AppState;

/// Course reminder request
#[derive(Debug, Deserialize)]
pub struct CourseReminderRequest {
    pub message: String,
}

/// Single notification request
#[derive(Debug, Deserialize)]
pub struct CreateNotificationRequest {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
}

/// Send a notification to one user
pub async fn create_notification(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthContext>,
    Json(payload): Json<CreateNotificationRequest>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Notification, Action::Create)?;

    let notification = Notification::create(
        &state.db_pool,
        payload.user_id,
        payload.kind,
        payload.message,
    )
    .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": notification
    })))
}

/// Batch notification request
#[derive(Debug, Deserialize)]
pub struct BatchNotificationRequest {
    pub user_ids: Vec<Uuid>,
    pub kind: NotificationKind,
    pub message: String,
}

/// Send one message to an explicit list of users
pub async fn create_batch_notifications(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthContext>,
    Json(payload): Json<BatchNotificationRequest>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Notification, Action::Create)?;

    if payload.user_ids.is_empty() {
        return Err(AppError::BadRequest(
            "user_ids must not be empty".to_string(),
        ));
    }

    let sent = Notification::create_batch(
        &state.db_pool,
        &payload.user_ids,
        payload.kind,
        &payload.message,
    )
    .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": {
            "recipients": sent
        }
    })))
}

/// List the authenticated user's notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(filter): Query<NotificationFilter>,
    Query(params): Query<PaginationParams>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Notification, Action::Read)?;

    let notifications =
        Notification::list_for_user(&state.db_pool, auth_user.user_id, &filter, &params).await?;
    let total = Notification::count_for_user(&state.db_pool, auth_user.user_id, &filter).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": PaginatedResponse::new(notifications, &params, total as u64)
    })))
}

/// Mark one notification as read
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Notification, Action::Update)?;

    let notification = Notification::find_by_id(&state.db_pool, notification_id)
        .await?
        .ok_or_else(|| AppError::not_found("Notification", notification_id))?;

    if notification.user_id != auth_user.user_id {
        return Err(AppError::Authorization(
            "Cannot modify another user's notification".to_string(),
        ));
    }

    let updated = notification.mark_read(&state.db_pool).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": updated
    })))
}

/// Mark all of the user's notifications as read
pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Notification, Action::Update)?;

    let updated = Notification::mark_all_read(&state.db_pool, auth_user.user_id).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": {
            "updated": updated
        }
    })))
}

/// Delete a notification
pub async fn delete_notification(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Notification, Action::Delete)?;

    let notification = Notification::find_by_id(&state.db_pool, notification_id)
        .await?
        .ok_or_else(|| AppError::not_found("Notification", notification_id))?;

    if !auth_user.is_admin() && notification.user_id != auth_user.user_id {
        return Err(AppError::Authorization(
            "Cannot delete another user's notification".to_string(),
        ));
    }

    notification.delete(&state.db_pool).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Notification deleted successfully"
    })))
}

/// Send a reminder to every active learner of a course
pub async fn send_course_reminder(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthContext>,
    Json(payload): Json<CourseReminderRequest>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Notification, Action::Notify)?;

    let course = Course::find_by_id(&state.db_pool, course_id)
        .await?
        .ok_or_else(|| AppError::not_found("Course", course_id))?;

    if !auth_user.is_admin()
        && !Course::is_creator(&state.db_pool, course_id, auth_user.user_id).await?
    {
        return Err(AppError::Authorization(
            "Only the course creator can notify its learners".to_string(),
        ));
    }

    let learner_ids = Enrollment::learner_ids_for_course(&state.db_pool, course_id).await?;
    let message = format!("[{}] {}", course.title, payload.message);

    let sent = Notification::create_batch(
        &state.db_pool,
        &learner_ids,
        NotificationKind::CourseReminder,
        &message,
    )
    .await?;

    tracing::info!(course_id = %course_id, recipients = sent, "Course reminder sent");

    Ok(Json(serde_json::json!({
        "success": true,
        "data": {
            "recipients": sent
        }
    })))
}
