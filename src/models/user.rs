//! User-related models and types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Entity, PaginationParams, UserRole};

/// User model
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for User {
    fn id(&self) -> Uuid {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// User creation request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub role: UserRole,
}

/// User update request
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUser {
    pub display_name: Option<String>,
    pub is_active: Option<bool>,
}

/// User profile response (without sensitive data)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            display_name: user.display_name,
            role: user.role,
            is_active: user.is_active,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
        }
    }
}

/// Login request
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub user: UserProfile,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}

/// Per-user activity statistics, recomputed on demand
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserStats {
    pub user_id: Uuid,
    pub enrollments: i64,
    pub completed_courses: i64,
    pub certificates: i64,
    pub average_progression: f64,
}

impl User {
    /// Create a new user with hashed password
    pub async fn create(db: &sqlx::PgPool, create_user: CreateUser) -> Result<Self, AppError> {
        let password_hash = bcrypt::hash(&create_user.password, bcrypt::DEFAULT_COST)?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, display_name, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(create_user.username)
        .bind(create_user.email)
        .bind(password_hash)
        .bind(create_user.display_name)
        .bind(create_user.role)
        .fetch_one(db)
        .await
        .map_err(AppError::Database)?;

        Ok(user)
    }

    /// Find user by ID
    pub async fn find_by_id(db: &sqlx::PgPool, user_id: Uuid) -> Result<Option<Self>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(db)
            .await
            .map_err(AppError::Database)?;

        Ok(user)
    }

    /// Find user by username
    pub async fn find_by_username(
        db: &sqlx::PgPool,
        username: &str,
    ) -> Result<Option<Self>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(db)
            .await
            .map_err(AppError::Database)?;

        Ok(user)
    }

    /// Find user by email
    pub async fn find_by_email(db: &sqlx::PgPool, email: &str) -> Result<Option<Self>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(db)
            .await
            .map_err(AppError::Database)?;

        Ok(user)
    }

    /// Verify a plaintext password against the stored hash
    pub fn verify_password(&self, password: &str) -> bool {
        bcrypt::verify(password, &self.password_hash).unwrap_or(false)
    }

    /// Update profile fields
    pub async fn update(&self, db: &sqlx::PgPool, update: UpdateUser) -> Result<Self, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                display_name = COALESCE($1, display_name),
                is_active = COALESCE($2, is_active),
                updated_at = NOW()
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(update.display_name)
        .bind(update.is_active)
        .bind(self.id)
        .fetch_one(db)
        .await
        .map_err(AppError::Database)?;

        Ok(user)
    }

    /// Record a successful login
    pub async fn update_last_login(&self, db: &sqlx::PgPool) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(self.id)
            .execute(db)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }

    /// Change a user's role (admin operation)
    pub async fn set_role(
        db: &sqlx::PgPool,
        user_id: Uuid,
        role: UserRole,
    ) -> Result<Self, AppError> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET role = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(role)
        .bind(user_id)
        .fetch_optional(db)
        .await
        .map_err(AppError::Database)?
        .ok_or_else(|| AppError::not_found("User", user_id))?;

        Ok(user)
    }

    /// List users (admin view)
    pub async fn list(
        db: &sqlx::PgPool,
        params: &PaginationParams,
    ) -> Result<Vec<UserProfile>, AppError> {
        let users = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT id, username, email, display_name, role, is_active,
                   last_login_at, created_at
            FROM users
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(params.limit() as i64)
        .bind(params.offset() as i64)
        .fetch_all(db)
        .await
        .map_err(AppError::Database)?;

        Ok(users)
    }

    /// Total user count
    pub async fn count(db: &sqlx::PgPool) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(db)
            .await
            .map_err(AppError::Database)?;

        Ok(count)
    }

    /// User count for one role
    pub async fn count_by_role(db: &sqlx::PgPool, role: UserRole) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role = $1")
            .bind(role)
            .fetch_one(db)
            .await
            .map_err(AppError::Database)?;

        Ok(count)
    }

    /// Learning activity statistics for one user
    pub async fn stats(db: &sqlx::PgPool, user_id: Uuid) -> Result<UserStats, AppError> {
        let stats = sqlx::query_as::<_, UserStats>(
            r#"
            SELECT
                $1 as user_id,
                (SELECT COUNT(*) FROM enrollments WHERE learner_id = $1) as enrollments,
                (SELECT COUNT(*) FROM enrollments
                 WHERE learner_id = $1 AND status = 'completed') as completed_courses,
                (SELECT COUNT(*) FROM certificates WHERE learner_id = $1) as certificates,
                COALESCE((SELECT AVG(percent)::float8 FROM progressions
                          WHERE learner_id = $1), 0) as average_progression
            "#,
        )
        .bind(user_id)
        .fetch_one(db)
        .await
        .map_err(AppError::Database)?;

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "marie".to_string(),
            email: "marie@example.com".to_string(),
            password_hash: bcrypt::hash("Sup3rSecret!", 4).unwrap(),
            display_name: "Marie".to_string(),
            role: UserRole::Learner,
            is_active: true,
            last_login_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_verify_password() {
        let user = sample_user();
        assert!(user.verify_password("Sup3rSecret!"));
        assert!(!user.verify_password("wrong"));
    }

    #[test]
    fn test_profile_strips_password_hash() {
        let user = sample_user();
        let profile = UserProfile::from(user.clone());
        assert_eq!(profile.id, user.id);

        let json = serde_json::to_value(&profile).unwrap();
        assert!(json.get("password_hash").is_none());
    }
}
