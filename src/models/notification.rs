//! User notification models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{NotificationKind, PaginationParams};

/// A message delivered to one user's notification feed
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Notification listing filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationFilter {
    pub unread_only: Option<bool>,
}

impl Notification {
    /// Create a notification for one user
    pub async fn create(
        db: &sqlx::PgPool,
        user_id: Uuid,
        kind: NotificationKind,
        message: String,
    ) -> Result<Self, AppError> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (user_id, kind, message)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(kind)
        .bind(message)
        .fetch_one(db)
        .await
        .map_err(AppError::Database)?;

        Ok(notification)
    }

    /// Fan one message out to many users in a single transaction
    pub async fn create_batch(
        db: &sqlx::PgPool,
        user_ids: &[Uuid],
        kind: NotificationKind,
        message: &str,
    ) -> Result<u64, AppError> {
        if user_ids.is_empty() {
            return Ok(0);
        }

        let mut tx = db.begin().await.map_err(AppError::Database)?;

        let mut created = 0u64;
        for user_id in user_ids {
            let result = sqlx::query(
                "INSERT INTO notifications (user_id, kind, message) VALUES ($1, $2, $3)",
            )
            .bind(user_id)
            .bind(kind)
            .bind(message)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;

            created += result.rows_affected();
        }

        tx.commit().await.map_err(AppError::Database)?;

        Ok(created)
    }

    /// Find notification by ID
    pub async fn find_by_id(
        db: &sqlx::PgPool,
        notification_id: Uuid,
    ) -> Result<Option<Self>, AppError> {
        let notification =
            sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE id = $1")
                .bind(notification_id)
                .fetch_optional(db)
                .await
                .map_err(AppError::Database)?;

        Ok(notification)
    }

    /// List a user's notifications, newest first
    pub async fn list_for_user(
        db: &sqlx::PgPool,
        user_id: Uuid,
        filter: &NotificationFilter,
        params: &PaginationParams,
    ) -> Result<Vec<Self>, AppError> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1
              AND (NOT $2 OR is_read = FALSE)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(filter.unread_only.unwrap_or(false))
        .bind(params.limit() as i64)
        .bind(params.offset() as i64)
        .fetch_all(db)
        .await
        .map_err(AppError::Database)?;

        Ok(notifications)
    }

    /// Count a user's notifications under the same filter
    pub async fn count_for_user(
        db: &sqlx::PgPool,
        user_id: Uuid,
        filter: &NotificationFilter,
    ) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM notifications
            WHERE user_id = $1
              AND (NOT $2 OR is_read = FALSE)
            "#,
        )
        .bind(user_id)
        .bind(filter.unread_only.unwrap_or(false))
        .fetch_one(db)
        .await
        .map_err(AppError::Database)?;

        Ok(count)
    }

    /// Mark this notification as read
    pub async fn mark_read(&self, db: &sqlx::PgPool) -> Result<Self, AppError> {
        let notification = sqlx::query_as::<_, Notification>(
            "UPDATE notifications SET is_read = TRUE WHERE id = $1 RETURNING *",
        )
        .bind(self.id)
        .fetch_one(db)
        .await
        .map_err(AppError::Database)?;

        Ok(notification)
    }

    /// Mark all of a user's notifications as read
    pub async fn mark_all_read(db: &sqlx::PgPool, user_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .execute(db)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }

    /// Delete this notification
    pub async fn delete(&self, db: &sqlx::PgPool) -> Result<(), AppError> {
        sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(self.id)
            .execute(db)
            .await
            .map_err(AppError::Database)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&NotificationKind::Certificate).unwrap(),
            "\"certificate\""
        );
        assert_eq!(
            serde_json::to_string(&NotificationKind::CourseReminder).unwrap(),
            "\"course_reminder\""
        );
    }

    #[test]
    fn test_filter_defaults() {
        let filter = NotificationFilter::default();
        assert!(filter.unread_only.is_none());
    }
}
