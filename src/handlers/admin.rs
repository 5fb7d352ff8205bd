//! Administration request handlers

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
use crate::models::domain::Domain;
use crate::models::user::User;
use crate::models::{ApprovalStatus, PaginatedResponse, PaginationParams, UserRole};
use crate::server::AppState;

/// Role change request
#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: UserRole,
}

/// Platform-wide counters
pub async fn get_overview(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Stats, Action::Read)?;

    let db = &state.db_pool;

    let users = User::count(db).await?;
    let learners = User::count_by_role(db, UserRole::Learner).await?;
    let instructors = User::count_by_role(db, UserRole::Instructor).await?;
    let domains = Domain::count(db).await?;
    let courses = Course::count(db, &Default::default()).await?;
    let pending_courses = Course::count_by_status(db, ApprovalStatus::Pending).await?;

    let enrollments = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM enrollments")
        .fetch_one(db)
        .await
        .map_err(AppError::Database)?;

    let certificates = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM certificates")
        .fetch_one(db)
        .await
        .map_err(AppError::Database)?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": {
            "users": users,
            "learners": learners,
            "instructors": instructors,
            "domains": domains,
            "courses": courses,
            "pending_courses": pending_courses,
            "enrollments": enrollments,
            "certificates": certificates
        }
    })))
}

/// List all users
pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::User, Action::Read)?;

    let users = User::list(&state.db_pool, &params).await?;
    let total = User::count(&state.db_pool).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": PaginatedResponse::new(users, &params, total as u64)
    })))
}

/// Change a user's role
pub async fn set_user_role(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthContext>,
    Json(payload): Json<SetRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::User, Action::Update)?;

    if user_id == auth_user.user_id {
        return Err(AppError::BadRequest(
            "Cannot change your own role".to_string(),
        ));
    }

    let user = User::set_role(&state.db_pool, user_id, payload.role).await?;

    tracing::info!(
        user_id = %user_id,
        role = ?payload.role,
        changed_by = %auth_user.user_id,
        "User role changed"
    );

    Ok(Json(serde_json::json!({
        "success": true,
        "data": crate::models::user::UserProfile::from(user)
    })))
}

/// Learning statistics for one user
pub async fn get_user_stats(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Stats, Action::Read)?;

    User::find_by_id(&state.db_pool, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User", user_id))?;

    let stats = User::stats(&state.db_pool, user_id).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": stats
    })))
}

/// Aggregate statistics for one course
pub async fn get_course_stats(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Stats, Action::Read)?;

    Course::find_by_id(&state.db_pool, course_id)
        .await?
        .ok_or_else(|| AppError::not_found("Course", course_id))?;

    let stats = Course::stats(&state.db_pool, course_id).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": stats
    })))
}

/// Courses awaiting approval
pub async fn list_pending_courses(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Stats, Action::Read)?;

    let courses = sqlx::query_as::<_, Course>(
        r#"
        SELECT * FROM courses
        WHERE approval_status = 'pending'
        ORDER BY created_at
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(params.limit() as i64)
    .bind(params.offset() as i64)
    .fetch_all(&state.db_pool)
    .await
    .map_err(AppError::Database)?;

    let total = Course::count_by_status(&state.db_pool, ApprovalStatus::Pending).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": PaginatedResponse::new(courses, &params, total as u64)
    })))
}
