//! Enrollment, progression and certificate request handlers

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::authz::{self, Action, Resource};
use crate::error::AppError;
use crate::models::auth::AuthContext;
use crate::models::enrollment::{Certificate, Enrollment, ProgressChange, Progression};
use crate::models::PaginationParams;
use crate::server::AppState;

/// Enrollment request
#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    pub course_id: Uuid,
}

/// Enroll the authenticated learner in a course
pub async fn enroll(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthContext>,
    Json(payload): Json<EnrollRequest>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Enrollment, Action::Enroll)?;

    let enrollment =
        Enrollment::create(&state.db_pool, auth_user.user_id, payload.course_id).await?;

    tracing::info!(
        learner_id = %auth_user.user_id,
        course_id = %payload.course_id,
        "Learner enrolled"
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "data": enrollment
        })),
    ))
}

/// List the authenticated learner's enrollments
pub async fn list_enrollments(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Enrollment, Action::Read)?;

    let enrollments =
        Enrollment::list_for_learner(&state.db_pool, auth_user.user_id, &params).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": {
            "enrollments": enrollments
        }
    })))
}

/// Cancel an enrollment
pub async fn cancel_enrollment(
    State(state): State<AppState>,
    Path(enrollment_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Enrollment, Action::Update)?;

    let enrollment = Enrollment::find_by_id(&state.db_pool, enrollment_id)
        .await?
        .ok_or_else(|| AppError::not_found("Enrollment", enrollment_id))?;

    if !auth_user.is_admin() && enrollment.learner_id != auth_user.user_id {
        return Err(AppError::Authorization(
            "Cannot cancel another learner's enrollment".to_string(),
        ));
    }

    let cancelled = enrollment.cancel(&state.db_pool).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": cancelled
    })))
}

/// Current progression in one course
pub async fn get_progress(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Enrollment, Action::Read)?;

    let progression = Progression::find_for_learner(&state.db_pool, auth_user.user_id, course_id)
        .await?
        .ok_or_else(|| AppError::BadRequest("Not enrolled in this course".to_string()))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": progression
    })))
}

/// Progress update request
#[derive(Debug, Deserialize)]
pub struct UpdateProgressRequest {
    pub percentage: i32,
}

/// Record a content-completion progress update.
///
/// The percentage is a floor: progression rises to at least this value
/// and never moves backwards. Reaching 100 settles completion and the
/// certificate like any other progress write.
pub async fn update_progress(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthContext>,
    Json(payload): Json<UpdateProgressRequest>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Enrollment, Action::Update)?;

    if !(0..=100).contains(&payload.percentage) {
        return Err(AppError::BadRequest(
            "Percentage must be between 0 and 100".to_string(),
        ));
    }

    let report = Enrollment::record_progress(
        &state.db_pool,
        auth_user.user_id,
        course_id,
        ProgressChange::Floor(payload.percentage),
    )
    .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": report
    })))
}

/// List the authenticated learner's certificates
pub async fn list_certificates(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Certificate, Action::Read)?;

    let certificates = Certificate::list_for_learner(&state.db_pool, auth_user.user_id).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": {
            "certificates": certificates
        }
    })))
}

/// Download a certificate as a plain-text attestation
pub async fn download_certificate(
    State(state): State<AppState>,
    Path(certificate_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Certificate, Action::Read)?;

    let certificate = Certificate::find_by_id(&state.db_pool, certificate_id)
        .await?
        .ok_or_else(|| AppError::not_found("Certificate", certificate_id))?;

    if !auth_user.is_admin() && certificate.learner_id != auth_user.user_id {
        return Err(AppError::Authorization(
            "Cannot download another learner's certificate".to_string(),
        ));
    }

    let course_title =
        sqlx::query_scalar::<_, String>("SELECT title FROM courses WHERE id = $1")
            .bind(certificate.course_id)
            .fetch_one(&state.db_pool)
            .await
            .map_err(AppError::Database)?;

    let body = format!(
        "CERTIFICATE OF COMPLETION\n\nSerial: {}\nCourse: {}\nIssued: {}\n\nThis certifies that {} has completed the course.\n",
        certificate.serial,
        course_title,
        certificate.issued_at.format("%Y-%m-%d"),
        auth_user.username,
    );

    let headers = [
        (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"certificate-{}.txt\"", certificate.serial),
        ),
    ];

    Ok((headers, body))
}
