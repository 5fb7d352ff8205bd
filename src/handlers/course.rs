//! Course request handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::authz::{self, Action, Resource};
use crate::error::AppError;
use crate::models::auth::AuthContext;
use crate::models::course::{Course, CourseFilter, CreateCourse, UpdateCourse};
use crate::models::{ApprovalStatus, PaginatedResponse, PaginationParams};
use crate::server::AppState;

/// Publication toggle request
#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub published: bool,
}

/// Check that the caller owns the course or is an admin
async fn require_course_owner(
    state: &AppState,
    course_id: Uuid,
    auth_user: &AuthContext,
) -> Result<Course, AppError> {
    let course = Course::find_by_id(&state.db_pool, course_id)
        .await?
        .ok_or_else(|| AppError::not_found("Course", course_id))?;

    if !auth_user.is_admin()
        && !Course::is_creator(&state.db_pool, course_id, auth_user.user_id).await?
    {
        return Err(AppError::Authorization(
            "Only the course creator can modify this course".to_string(),
        ));
    }

    Ok(course)
}

/// List the course catalog.
///
/// Learners only ever see approved, published courses; staff may relax
/// the filter to inspect the rest.
pub async fn list_courses(
    State(state): State<AppState>,
    Query(filter): Query<CourseFilter>,
    Query(params): Query<PaginationParams>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Course, Action::Read)?;

    let mut filter = filter;
    if auth_user.is_learner() {
        filter.published_only = Some(true);
    }

    let courses = Course::list(&state.db_pool, &filter, &params).await?;
    let total = Course::count(&state.db_pool, &filter).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": PaginatedResponse::new(courses, &params, total as u64)
    })))
}

/// Create a new course.
///
/// Instructor-created courses start pending approval; admin-created
/// courses may skip the queue depending on configuration.
pub async fn create_course(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthContext>,
    Json(payload): Json<CreateCourse>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Course, Action::Create)?;
    payload.validate()?;

    let initial_status = if auth_user.is_admin() && state.config.learning.auto_approve_admin_courses
    {
        ApprovalStatus::Approved
    } else {
        ApprovalStatus::Pending
    };

    let course = Course::create(&state.db_pool, auth_user.user_id, payload, initial_status).await?;
    let details = Course::get_with_details(&state.db_pool, course.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "data": details
        })),
    ))
}

/// Get a course with its domain, creator, contents and quizzes
pub async fn get_course(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Course, Action::Read)?;

    let details = Course::get_with_details(&state.db_pool, course_id).await?;

    // A course invisible in the catalog stays invisible by direct lookup
    if auth_user.is_learner() && !details.course.is_open_for_enrollment() {
        return Err(AppError::not_found("Course", course_id));
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "data": details
    })))
}

/// Update a course
pub async fn update_course(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthContext>,
    Json(payload): Json<UpdateCourse>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Course, Action::Update)?;
    payload.validate()?;

    let course = require_course_owner(&state, course_id, &auth_user).await?;
    let updated = course.update(&state.db_pool, payload).await?;
    let details = Course::get_with_details(&state.db_pool, updated.id).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": details
    })))
}

/// Delete a course with its contents and quizzes
pub async fn delete_course(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Course, Action::Delete)?;

    let course = require_course_owner(&state, course_id, &auth_user).await?;
    course.delete(&state.db_pool).await?;

    tracing::info!(course_id = %course_id, "Course deleted");

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Course deleted successfully"
    })))
}

/// Approve a pending course
pub async fn approve_course(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Course, Action::Approve)?;

    let course = Course::find_by_id(&state.db_pool, course_id)
        .await?
        .ok_or_else(|| AppError::not_found("Course", course_id))?;

    let updated = course
        .set_approval_status(&state.db_pool, ApprovalStatus::Approved)
        .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": updated
    })))
}

/// Reject a pending course
pub async fn reject_course(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Course, Action::Approve)?;

    let course = Course::find_by_id(&state.db_pool, course_id)
        .await?
        .ok_or_else(|| AppError::not_found("Course", course_id))?;

    let updated = course
        .set_approval_status(&state.db_pool, ApprovalStatus::Rejected)
        .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": updated
    })))
}

/// Publish or unpublish a course
pub async fn publish_course(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthContext>,
    Json(payload): Json<PublishRequest>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Course, Action::Publish)?;

    let course = require_course_owner(&state, course_id, &auth_user).await?;

    if payload.published && course.approval_status != ApprovalStatus::Approved {
        return Err(AppError::BadRequest(
            "Only approved courses can be published".to_string(),
        ));
    }

    let updated = course.set_published(&state.db_pool, payload.published).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": updated
    })))
}

/// Courses created by the authenticated instructor
pub async fn list_my_courses(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Course, Action::Create)?;

    let courses = Course::list_for_creator(&state.db_pool, auth_user.user_id, &params).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": {
            "courses": courses
        }
    })))
}
