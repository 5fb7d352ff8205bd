//! Domain request handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::authz::{self, Action, Resource};
use crate::error::AppError;
use crate::models::auth::AuthContext;
use crate::models::domain::{CreateDomain, Domain, UpdateDomain};
use crate::models::{PaginatedResponse, PaginationParams};
use crate::server::AppState;

/// List domains
pub async fn list_domains(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Domain, Action::Read)?;

    let domains = Domain::list(&state.db_pool, &params).await?;
    let total = Domain::count(&state.db_pool).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": PaginatedResponse::new(domains, &params, total as u64)
    })))
}

/// Create a new domain
pub async fn create_domain(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthContext>,
    Json(payload): Json<CreateDomain>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Domain, Action::Create)?;
    payload.validate()?;

    let domain = Domain::create(&state.db_pool, payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "data": domain
        })),
    ))
}

/// Get a domain with its course ids
pub async fn get_domain(
    State(state): State<AppState>,
    Path(domain_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Domain, Action::Read)?;

    let domain = Domain::get_with_courses(&state.db_pool, domain_id).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": domain
    })))
}

/// Rename a domain
pub async fn update_domain(
    State(state): State<AppState>,
    Path(domain_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthContext>,
    Json(payload): Json<UpdateDomain>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Domain, Action::Update)?;
    payload.validate()?;

    let domain = Domain::find_by_id(&state.db_pool, domain_id)
        .await?
        .ok_or_else(|| AppError::not_found("Domain", domain_id))?;

    let updated = domain.update(&state.db_pool, payload).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": updated
    })))
}

/// Delete a domain and all the courses it groups
pub async fn delete_domain(
    State(state): State<AppState>,
    Path(domain_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Domain, Action::Delete)?;

    let domain = Domain::find_by_id(&state.db_pool, domain_id)
        .await?
        .ok_or_else(|| AppError::not_found("Domain", domain_id))?;

    domain.delete(&state.db_pool).await?;

    tracing::info!(domain_id = %domain_id, "Domain deleted with its courses");

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Domain deleted successfully"
    })))
}
