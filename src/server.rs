//! Web server implementation with Axum

use crate::config::Config;
use crate::error::{AppError, RequestId};
use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn};

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db_pool: sqlx::PgPool,
    pub jwt_service: Arc<crate::models::auth::JwtService>,
    pub rate_limiter: Arc<crate::middleware::RateLimiter>,
}

// Ensure AppState satisfies the bounds required by Axum's State extractor
const _: fn() = || {
    fn assert_bounds<T: Clone + Send + Sync + 'static>() {}
    assert_bounds::<AppState>();
};

impl AppState {
    /// Create new application state
    pub fn new(config: Config, db_pool: sqlx::PgPool) -> Result<Self, AppError> {
        let jwt_service = crate::models::auth::JwtService::new(
            &config.jwt.secret,
            config.jwt.issuer.clone(),
            config.jwt.expiration as i64,
            config.jwt.refresh_expiration as i64,
        )?;

        Ok(AppState {
            config: Arc::new(config),
            db_pool,
            jwt_service: Arc::new(jwt_service),
            rate_limiter: Arc::new(crate::middleware::RateLimiter::new()),
        })
    }
}

/// Application router
pub fn create_router(state: &AppState) -> Router<AppState> {
    let cors = CorsLayer::new()
        .allow_origin(Any) // Configure appropriately for production
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let compression = CompressionLayer::new();

    // Transport cap sized for the largest accepted request (uploads);
    // JSON endpoints are held to the tighter server body limit, which the
    // upload route overrides below.
    let request_body_limit = RequestBodyLimitLayer::new(
        state.config.storage.max_upload_size.max(state.config.server.body_limit),
    );

    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        // API routes
        .nest("/api/v1", api_routes(state))
        // Middleware
        .layer(DefaultBodyLimit::max(state.config.server.body_limit))
        .layer(request_body_limit)
        .layer(TimeoutLayer::new(Duration::from_secs(
            state.config.server.request_timeout,
        )))
        .layer(compression)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_response(DefaultOnResponse::new()),
        )
        .layer(middleware::from_fn(request_id_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(middleware::from_fn(logging_middleware))
        .fallback(not_found_handler)
}

/// API routes
fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes(state))
        .nest("/users", user_routes())
        .nest("/domains", domain_routes())
        .nest("/courses", course_routes())
        .nest("/contents", content_routes(state))
        .nest("/quizzes", quiz_routes())
        .nest("/learning", learning_routes())
        .nest("/notifications", notification_routes())
        .nest("/admin", admin_routes())
}

/// Authentication routes
fn auth_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/register", post(crate::handlers::auth::register))
        .route("/login", post(crate::handlers::auth::login))
        .route("/refresh", post(crate::handlers::auth::refresh))
        .route("/logout", post(crate::handlers::auth::logout))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            crate::middleware::auth_rate_limit_middleware,
        ))
}

/// User routes
fn user_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/me",
            get(crate::handlers::user::get_current_user)
                .put(crate::handlers::user::update_current_user),
        )
        .route("/me/stats", get(crate::handlers::user::get_current_user_stats))
}

/// Domain routes
fn domain_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(crate::handlers::domain::list_domains).post(crate::handlers::domain::create_domain),
        )
        .route(
            "/:id",
            get(crate::handlers::domain::get_domain)
                .put(crate::handlers::domain::update_domain)
                .delete(crate::handlers::domain::delete_domain),
        )
}

/// Course routes
fn course_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(crate::handlers::course::list_courses).post(crate::handlers::course::create_course),
        )
        .route("/mine", get(crate::handlers::course::list_my_courses))
        .route(
            "/:id",
            get(crate::handlers::course::get_course)
                .put(crate::handlers::course::update_course)
                .delete(crate::handlers::course::delete_course),
        )
        .route("/:id/approve", post(crate::handlers::course::approve_course))
        .route("/:id/reject", post(crate::handlers::course::reject_course))
        .route("/:id/publish", post(crate::handlers::course::publish_course))
        .route("/:id/contents", get(crate::handlers::content::list_contents))
        .route("/:id/quizzes", get(crate::handlers::quiz::list_quizzes))
        .route(
            "/:id/notify",
            post(crate::handlers::notification::send_course_reminder),
        )
}

/// Content routes
fn content_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(crate::handlers::content::create_content))
        .route(
            "/upload",
            post(crate::handlers::content::upload_content)
                .layer(DefaultBodyLimit::max(state.config.storage.max_upload_size)),
        )
        .route(
            "/:id",
            get(crate::handlers::content::get_content)
                .put(crate::handlers::content::update_content)
                .delete(crate::handlers::content::delete_content),
        )
        .route(
            "/:id/download",
            get(crate::handlers::content::download_content),
        )
}

/// Quiz routes
fn quiz_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(crate::handlers::quiz::create_quiz))
        .route(
            "/:id",
            get(crate::handlers::quiz::get_quiz)
                .put(crate::handlers::quiz::update_quiz)
                .delete(crate::handlers::quiz::delete_quiz),
        )
        .route("/:id/submit", post(crate::handlers::quiz::submit_quiz))
}

/// Learning routes: enrollments, progression, certificates
fn learning_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/enrollments",
            get(crate::handlers::learning::list_enrollments)
                .post(crate::handlers::learning::enroll),
        )
        .route(
            "/enrollments/:id/cancel",
            post(crate::handlers::learning::cancel_enrollment),
        )
        .route(
            "/courses/:id/progress",
            get(crate::handlers::learning::get_progress)
                .put(crate::handlers::learning::update_progress),
        )
        .route(
            "/certificates",
            get(crate::handlers::learning::list_certificates),
        )
        .route(
            "/certificates/:id/download",
            get(crate::handlers::learning::download_certificate),
        )
}

/// Notification routes
fn notification_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(crate::handlers::notification::list_notifications)
                .post(crate::handlers::notification::create_notification),
        )
        .route(
            "/batch",
            post(crate::handlers::notification::create_batch_notifications),
        )
        .route(
            "/read-all",
            post(crate::handlers::notification::mark_all_read),
        )
        .route(
            "/:id/read",
            post(crate::handlers::notification::mark_notification_read),
        )
        .route(
            "/:id",
            delete(crate::handlers::notification::delete_notification),
        )
}

/// Admin routes
fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/overview", get(crate::handlers::admin::get_overview))
        .route("/users", get(crate::handlers::admin::list_users))
        .route("/users/:id/role", put(crate::handlers::admin::set_user_role))
        .route("/users/:id/stats", get(crate::handlers::admin::get_user_stats))
        .route(
            "/courses/pending",
            get(crate::handlers::admin::list_pending_courses),
        )
        .route(
            "/courses/:id/stats",
            get(crate::handlers::admin::get_course_stats),
        )
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Not found handler
async fn not_found_handler() -> impl IntoResponse {
    let status = StatusCode::NOT_FOUND;
    let body = Json(serde_json::json!({
        "success": false,
        "error": {
            "message": "Endpoint not found",
            "code": "NOT_FOUND"
        }
    }));
    (status, body)
}

/// Request ID middleware
async fn request_id_middleware(request: Request, next: Next) -> Result<Response, Infallible> {
    let request_id = RequestId::generate();

    let headers = request.headers();
    let existing_id = headers
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| uuid::Uuid::parse_str(value).ok());

    let request_id = existing_id.map(RequestId).unwrap_or(request_id);

    let mut request = request;
    request.extensions_mut().insert(request_id);

    Ok(next.run(request).await)
}

/// Paths reachable without a bearer token
fn is_public_path(path: &str) -> bool {
    path == "/health"
        || path == "/api/v1/auth/register"
        || path == "/api/v1/auth/login"
        || path == "/api/v1/auth/refresh"
}

/// Authentication middleware
async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Infallible> {
    let path = request.uri().path();
    if is_public_path(path) {
        return Ok(next.run(request).await);
    }

    let headers = request.headers();
    let auth_header = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok());

    if let Some(auth_header) = auth_header {
        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            match state.jwt_service.verify_token(token) {
                Ok(claims) => match crate::models::auth::AuthContext::try_from(claims) {
                    Ok(auth_context) => {
                        if auth_context.is_expired() {
                            return Ok(AppError::Authentication(
                                "Token has expired".to_string(),
                            )
                            .into_response());
                        }

                        request.extensions_mut().insert(auth_context);
                        return Ok(next.run(request).await);
                    }
                    Err(err) => {
                        return Ok(err.into_response());
                    }
                },
                Err(err) => {
                    return Ok(err.into_response());
                }
            }
        }
    }

    Ok(
        AppError::Authentication("Missing or invalid authorization header".to_string())
            .into_response(),
    )
}

/// Logging middleware
async fn logging_middleware(request: Request, next: Next) -> Result<Response, Infallible> {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let start_time = std::time::Instant::now();

    let response = next.run(request).await;

    let duration = start_time.elapsed();
    let status = response.status();

    match status.as_u16() {
        200..=299 => {
            info!(
                request_id = %request_id,
                method = %method,
                uri = %uri,
                status = %status,
                duration_ms = %duration.as_millis(),
                "Request completed successfully"
            );
        }
        400..=499 => {
            warn!(
                request_id = %request_id,
                method = %method,
                uri = %uri,
                status = %status,
                duration_ms = %duration.as_millis(),
                "Client error"
            );
        }
        500..=599 => {
            tracing::error!(
                request_id = %request_id,
                method = %method,
                uri = %uri,
                status = %status,
                duration_ms = %duration.as_millis(),
                "Server error"
            );
        }
        _ => {}
    }

    Ok(response)
}

/// Start the web server
pub async fn start_server(config: Config, db_pool: sqlx::PgPool) -> Result<(), AppError> {
    let state = AppState::new(config.clone(), db_pool)?;

    let app = create_router(&state).with_state(state.clone());

    // Rate limit history is pruned in the background
    tokio::spawn(crate::middleware::cleanup_task(state.rate_limiter.clone()));

    let addr: SocketAddr = config
        .server
        .bind_address()
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid bind address: {}", e)))?;

    info!("Starting server on {}", config.server.bind_address());

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        AppError::Config(format!(
            "Failed to bind to {}: {}",
            config.server.bind_address(),
            e
        ))
    })?;

    axum::serve(listener, app.into_make_service())
        .await
        .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        DatabaseConfig, JwtConfig, LearningConfig, LoggingConfig, ProgressionPolicy, ServerConfig,
        StorageConfig,
    };
    use axum::body::Body;
    use tower::ServiceExt;

    fn test_config() -> Config {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                request_timeout: 5,
                body_limit: 1024,
            },
            database: DatabaseConfig {
                host: "localhost".to_string(),
                port: 5432,
                database: "cursus_test".to_string(),
                username: "postgres".to_string(),
                password: "".to_string(),
                max_connections: 5,
                min_connections: 1,
                connect_timeout: 5,
            },
            jwt: JwtConfig {
                secret: "0123456789abcdef0123456789abcdef".to_string(),
                expiration: 3600,
                refresh_expiration: 7200,
                issuer: "cursus-test".to_string(),
            },
            storage: StorageConfig {
                upload_dir: "./uploads".to_string(),
                max_upload_size: 4096,
            },
            learning: LearningConfig {
                pass_threshold: 50.0,
                progression: ProgressionPolicy {
                    passed_increment: 20,
                    failed_increment: 10,
                },
                auto_approve_admin_courses: true,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "compact".to_string(),
            },
        }
    }

    fn test_app(db_pool: sqlx::PgPool) -> Router {
        let state = AppState::new(test_config(), db_pool).unwrap();
        create_router(&state).with_state(state)
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = health_check().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[sqlx::test]
    async fn test_missing_token_is_unauthorized(db_pool: sqlx::PgPool) {
        let app = test_app(db_pool);

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/v1/courses")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    async fn test_json_body_over_limit_is_rejected(db_pool: sqlx::PgPool) {
        let app = test_app(db_pool);

        let oversized = format!(
            r#"{{"email":"a@example.test","password":"{}"}}"#,
            "x".repeat(2000)
        );
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/api/v1/auth/login")
                    .header("content-type", "application/json")
                    .body(Body::from(oversized))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_not_found_handler() {
        let response = not_found_handler().await.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_public_paths() {
        assert!(is_public_path("/health"));
        assert!(is_public_path("/api/v1/auth/login"));
        assert!(!is_public_path("/api/v1/auth/logout"));
        assert!(!is_public_path("/api/v1/courses"));
    }
}
