//! Lesson content models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::models::course::Course;
use crate::models::{ContentKind, Entity};

/// A lesson item belonging to exactly one course
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Content {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub kind: ContentKind,
    pub url: Option<String>,
    pub body: Option<String>,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Content {
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

/// Content creation request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateContent {
    pub course_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub kind: ContentKind,
    pub url: Option<String>,
    pub body: Option<String>,
}

/// Content update request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateContent {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub kind: Option<ContentKind>,
    pub url: Option<String>,
    pub body: Option<String>,
}

impl Content {
    /// Create a content item at the end of the course's ordering.
    ///
    /// The parent course must exist; membership in the course's content
    /// sequence is the row itself, so there is no reference list to patch.
    pub async fn create(db: &sqlx::PgPool, create: CreateContent) -> Result<Self, AppError> {
        Course::find_by_id(db, create.course_id)
            .await?
            .ok_or_else(|| AppError::not_found("Course", create.course_id))?;

        let content = sqlx::query_as::<_, Content>(
            r#"
            INSERT INTO contents (course_id, title, kind, url, body, position)
            VALUES (
                $1, $2, $3, $4, $5,
                (SELECT COALESCE(MAX(position), -1) + 1 FROM contents WHERE course_id = $1)
            )
            RETURNING *
            "#,
        )
        .bind(create.course_id)
        .bind(create.title)
        .bind(create.kind)
        .bind(create.url)
        .bind(create.body)
        .fetch_one(db)
        .await
        .map_err(AppError::Database)?;

        Ok(content)
    }

    /// Find content by ID
    pub async fn find_by_id(db: &sqlx::PgPool, content_id: Uuid) -> Result<Option<Self>, AppError> {
        let content = sqlx::query_as::<_, Content>("SELECT * FROM contents WHERE id = $1")
            .bind(content_id)
            .fetch_optional(db)
            .await
            .map_err(AppError::Database)?;

        Ok(content)
    }

    /// List the contents of a course in lesson order
    pub async fn list_for_course(
        db: &sqlx::PgPool,
        course_id: Uuid,
    ) -> Result<Vec<Self>, AppError> {
        let contents = sqlx::query_as::<_, Content>(
            "SELECT * FROM contents WHERE course_id = $1 ORDER BY position",
        )
        .bind(course_id)
        .fetch_all(db)
        .await
        .map_err(AppError::Database)?;

        Ok(contents)
    }

    /// Update content fields
    pub async fn update(&self, db: &sqlx::PgPool, update: UpdateContent) -> Result<Self, AppError> {
        let content = sqlx::query_as::<_, Content>(
            r#"
            UPDATE contents SET
                title = COALESCE($1, title),
                kind = COALESCE($2, kind),
                url = COALESCE($3, url),
                body = COALESCE($4, body),
                updated_at = NOW()
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(update.title)
        .bind(update.kind)
        .bind(update.url)
        .bind(update.body)
        .bind(self.id)
        .fetch_one(db)
        .await
        .map_err(AppError::Database)?;

        Ok(content)
    }

    /// Delete content
    pub async fn delete(&self, db: &sqlx::PgPool) -> Result<(), AppError> {
        sqlx::query("DELETE FROM contents WHERE id = $1")
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
    fn test_create_content_validation() {
        let create = CreateContent {
            course_id: Uuid::new_v4(),
            title: "".to_string(),
            kind: ContentKind::Video,
            url: None,
            body: None,
        };
        assert!(create.validate().is_err());

        let create = CreateContent {
            course_id: Uuid::new_v4(),
            title: "Chapitre 1".to_string(),
            kind: ContentKind::Text,
            url: None,
            body: Some("Bienvenue".to_string()),
        };
        assert!(create.validate().is_ok());
    }

    #[test]
    fn test_content_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&ContentKind::Document).unwrap(),
            "\"document\""
        );
    }
}
