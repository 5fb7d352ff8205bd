//! Lesson content request handlers

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::authz::{self, Action, Resource};
use crate::error::AppError;
use crate::models::auth::AuthContext;
use crate::models::content::{Content, CreateContent, UpdateContent};
use crate::models::course::Course;
use crate::models::enrollment::Enrollment;
use crate::models::ContentKind;
use crate::server::AppState;

/// Check that the caller may author content for this course
async fn require_content_author(
    state: &AppState,
    course_id: Uuid,
    auth_user: &AuthContext,
) -> Result<(), AppError> {
    Course::find_by_id(&state.db_pool, course_id)
        .await?
        .ok_or_else(|| AppError::not_found("Course", course_id))?;

    if !auth_user.is_admin()
        && !Course::is_creator(&state.db_pool, course_id, auth_user.user_id).await?
    {
        return Err(AppError::Authorization(
            "Only the course creator can manage its contents".to_string(),
        ));
    }

    Ok(())
}

/// Learners only read lesson material of courses they are enrolled in
async fn require_content_reader(
    state: &AppState,
    course_id: Uuid,
    auth_user: &AuthContext,
) -> Result<(), AppError> {
    if auth_user.is_learner() {
        Enrollment::find_for_learner(&state.db_pool, auth_user.user_id, course_id)
            .await?
            .ok_or_else(|| {
                AppError::Authorization("Enroll in the course to access its contents".to_string())
            })?;
    }

    Ok(())
}

/// List a course's contents in lesson order
pub async fn list_contents(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Content, Action::Read)?;

    Course::find_by_id(&state.db_pool, course_id)
        .await?
        .ok_or_else(|| AppError::not_found("Course", course_id))?;

    require_content_reader(&state, course_id, &auth_user).await?;

    let contents = Content::list_for_course(&state.db_pool, course_id).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": {
            "contents": contents
        }
    })))
}

/// Create a content item
pub async fn create_content(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthContext>,
    Json(payload): Json<CreateContent>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Content, Action::Create)?;
    payload.validate()?;

    require_content_author(&state, payload.course_id, &auth_user).await?;

    let content = Content::create(&state.db_pool, payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "data": content
        })),
    ))
}

/// Get a content item
pub async fn get_content(
    State(state): State<AppState>,
    Path(content_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Content, Action::Read)?;

    let content = Content::find_by_id(&state.db_pool, content_id)
        .await?
        .ok_or_else(|| AppError::not_found("Content", content_id))?;

    require_content_reader(&state, content.course_id, &auth_user).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": content
    })))
}

/// Update a content item
pub async fn update_content(
    State(state): State<AppState>,
    Path(content_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthContext>,
    Json(payload): Json<UpdateContent>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Content, Action::Update)?;
    payload.validate()?;

    let content = Content::find_by_id(&state.db_pool, content_id)
        .await?
        .ok_or_else(|| AppError::not_found("Content", content_id))?;

    require_content_author(&state, content.course_id, &auth_user).await?;

    let updated = content.update(&state.db_pool, payload).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": updated
    })))
}

/// Delete a content item
pub async fn delete_content(
    State(state): State<AppState>,
    Path(content_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Content, Action::Delete)?;

    let content = Content::find_by_id(&state.db_pool, content_id)
        .await?
        .ok_or_else(|| AppError::not_found("Content", content_id))?;

    require_content_author(&state, content.course_id, &auth_user).await?;

    content.delete(&state.db_pool).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Content deleted successfully"
    })))
}

/// Upload a lesson file and create its content item.
///
/// Multipart fields: `course_id`, `title`, `kind` and the `file` itself.
/// The file lands under the configured upload directory with a generated
/// name; the content row keeps the relative path as its url.
pub async fn upload_content(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthContext>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Content, Action::Create)?;

    let mut course_id: Option<Uuid> = None;
    let mut title: Option<String> = None;
    let mut kind = ContentKind::Document;
    let mut file_name: Option<String> = None;
    let mut file_bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart payload: {}", e)))?
    {
        match field.name().unwrap_or_default() {
            "course_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid course_id field: {}", e)))?;
                course_id = Some(Uuid::parse_str(&text).map_err(|_| {
                    AppError::BadRequest("course_id is not a valid UUID".to_string())
                })?);
            }
            "title" => {
                title = Some(field.text().await.map_err(|e| {
                    AppError::BadRequest(format!("Invalid title field: {}", e))
                })?);
            }
            "kind" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid kind field: {}", e)))?;
                kind = serde_json::from_value(serde_json::Value::String(text))
                    .map_err(|_| AppError::BadRequest("Unknown content kind".to_string()))?;
            }
            "file" => {
                file_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read file: {}", e)))?;
                file_bytes = Some(bytes.to_vec());
            }
            _ => {}
        }
    }

    let course_id =
        course_id.ok_or_else(|| AppError::BadRequest("Missing course_id field".to_string()))?;
    let title = title.ok_or_else(|| AppError::BadRequest("Missing title field".to_string()))?;
    let file_bytes =
        file_bytes.ok_or_else(|| AppError::BadRequest("Missing file field".to_string()))?;

    if file_bytes.len() > state.config.storage.max_upload_size {
        return Err(AppError::BadRequest(format!(
            "File exceeds the {} byte upload limit",
            state.config.storage.max_upload_size
        )));
    }

    require_content_author(&state, course_id, &auth_user).await?;

    // Stored name is generated; the original name only survives as a suffix
    let safe_name: String = file_name
        .unwrap_or_else(|| "upload".to_string())
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect();
    let stored_name = format!("{}_{}", Uuid::new_v4(), safe_name);

    tokio::fs::create_dir_all(&state.config.storage.upload_dir)
        .await
        .map_err(|e| AppError::Storage(format!("Failed to create upload directory: {}", e)))?;

    let path = std::path::Path::new(&state.config.storage.upload_dir).join(&stored_name);
    tokio::fs::write(&path, &file_bytes)
        .await
        .map_err(|e| AppError::Storage(format!("Failed to store file: {}", e)))?;

    let content = Content::create(
        &state.db_pool,
        CreateContent {
            course_id,
            title,
            kind,
            url: Some(stored_name),
            body: None,
        },
    )
    .await?;

    tracing::info!(
        content_id = %content.id,
        course_id = %course_id,
        size = file_bytes.len(),
        "Lesson file uploaded"
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "data": content
        })),
    ))
}

/// Download the file backing a content item
pub async fn download_content(
    State(state): State<AppState>,
    Path(content_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Content, Action::Read)?;

    let content = Content::find_by_id(&state.db_pool, content_id)
        .await?
        .ok_or_else(|| AppError::not_found("Content", content_id))?;

    require_content_reader(&state, content.course_id, &auth_user).await?;

    let stored_name = content
        .url
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("Content has no attached file".to_string()))?;

    // Names are generated on upload; reject anything path-like
    if stored_name.contains('/') || stored_name.contains("..") {
        return Err(AppError::BadRequest("Invalid file reference".to_string()));
    }

    let path = std::path::Path::new(&state.config.storage.upload_dir).join(stored_name);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| AppError::Storage(format!("Failed to read file: {}", e)))?;

    let headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", stored_name),
        ),
    ];

    Ok((headers, bytes))
}
