//! Subject-matter domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::models::{Entity, PaginationParams};

/// Top-level subject category grouping courses (e.g. "Informatique")
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Domain {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Domain {
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

/// Domain creation request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateDomain {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
}

/// Domain update request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateDomain {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
}

/// Domain with the ids of the courses it groups.
///
/// Course membership is derived from `courses.domain_id`, so every id
/// listed here belongs to a course whose domain is this one.
#[derive(Debug, Clone, Serialize)]
pub struct DomainWithCourses {
    #[serde(flatten)]
    pub domain: Domain,
    pub course_ids: Vec<Uuid>,
}

impl Domain {
    /// Create a new domain
    pub async fn create(db: &sqlx::PgPool, create: CreateDomain) -> Result<Self, AppError> {
        let domain =
            sqlx::query_as::<_, Domain>("INSERT INTO domains (name) VALUES ($1) RETURNING *")
                .bind(create.name)
                .fetch_one(db)
                .await
                .map_err(|e| match &e {
                    sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                        AppError::Conflict("A domain with this name already exists".to_string())
                    }
                    _ => AppError::Database(e),
                })?;

        Ok(domain)
    }

    /// Find domain by ID
    pub async fn find_by_id(db: &sqlx::PgPool, domain_id: Uuid) -> Result<Option<Self>, AppError> {
        let domain = sqlx::query_as::<_, Domain>("SELECT * FROM domains WHERE id = $1")
            .bind(domain_id)
            .fetch_optional(db)
            .await
            .map_err(AppError::Database)?;

        Ok(domain)
    }

    /// List domains
    pub async fn list(db: &sqlx::PgPool, params: &PaginationParams) -> Result<Vec<Self>, AppError> {
        let domains = sqlx::query_as::<_, Domain>(
            "SELECT * FROM domains ORDER BY name LIMIT $1 OFFSET $2",
        )
        .bind(params.limit() as i64)
        .bind(params.offset() as i64)
        .fetch_all(db)
        .await
        .map_err(AppError::Database)?;

        Ok(domains)
    }

    /// Total domain count
    pub async fn count(db: &sqlx::PgPool) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM domains")
            .fetch_one(db)
            .await
            .map_err(AppError::Database)?;

        Ok(count)
    }

    /// Ids of the courses grouped under this domain
    pub async fn course_ids(db: &sqlx::PgPool, domain_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM courses WHERE domain_id = $1 ORDER BY created_at",
        )
        .bind(domain_id)
        .fetch_all(db)
        .await
        .map_err(AppError::Database)?;

        Ok(ids)
    }

    /// Get domain with its course ids
    pub async fn get_with_courses(
        db: &sqlx::PgPool,
        domain_id: Uuid,
    ) -> Result<DomainWithCourses, AppError> {
        let domain = Self::find_by_id(db, domain_id)
            .await?
            .ok_or_else(|| AppError::not_found("Domain", domain_id))?;

        let course_ids = Self::course_ids(db, domain_id).await?;

        Ok(DomainWithCourses { domain, course_ids })
    }

    /// Update domain
    pub async fn update(&self, db: &sqlx::PgPool, update: UpdateDomain) -> Result<Self, AppError> {
        let domain = sqlx::query_as::<_, Domain>(
            r#"
            UPDATE domains SET
                name = COALESCE($1, name),
                updated_at = NOW()
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(update.name)
        .bind(self.id)
        .fetch_one(db)
        .await
        .map_err(AppError::Database)?;

        Ok(domain)
    }

    /// Delete a domain and everything it groups.
    ///
    /// Runs the full course cascade (questions, quizzes, contents and the
    /// learner records of every course in the domain, then the courses
    /// themselves) inside one transaction, so nothing is orphaned by
    /// removing its domain and no foreign key blocks the delete.
    pub async fn delete(&self, db: &sqlx::PgPool) -> Result<(), AppError> {
        let mut tx = db.begin().await.map_err(AppError::Database)?;

        sqlx::query(
            r#"
            DELETE FROM quiz_questions
            WHERE quiz_id IN (
                SELECT q.id FROM quizzes q
                JOIN courses c ON q.course_id = c.id
                WHERE c.domain_id = $1
            )
            "#,
        )
        .bind(self.id)
        .execute(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        for table in [
            "quizzes",
            "contents",
            "certificates",
            "progressions",
            "enrollments",
        ] {
            sqlx::query(&format!(
                "DELETE FROM {} WHERE course_id IN (SELECT id FROM courses WHERE domain_id = $1)",
                table
            ))
            .bind(self.id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;
        }

        sqlx::query("DELETE FROM courses WHERE domain_id = $1")
            .bind(self.id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        sqlx::query("DELETE FROM domains WHERE id = $1")
            .bind(self.id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_domain_validation() {
        let create = CreateDomain {
            name: "".to_string(),
        };
        assert!(create.validate().is_err());

        let create = CreateDomain {
            name: "Informatique".to_string(),
        };
        assert!(create.validate().is_ok());
    }

    #[test]
    fn test_domain_with_courses_serialization() {
        let domain = Domain {
            id: Uuid::new_v4(),
            name: "Informatique".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let with_courses = DomainWithCourses {
            domain: domain.clone(),
            course_ids: vec![Uuid::new_v4()],
        };

        let json = serde_json::to_value(&with_courses).unwrap();
        assert_eq!(json["name"], "Informatique");
        assert_eq!(json["course_ids"].as_array().unwrap().len(), 1);
    }

    #[sqlx::test]
    async fn test_delete_domain_with_enrolled_course(db: sqlx::PgPool) {
        use crate::models::course::tests::{seed_open_course, seed_user};
        use crate::models::course::Course;
        use crate::models::enrollment::Enrollment;

        let instructor = seed_user(&db, "instructor").await;
        let learner = seed_user(&db, "learner").await;
        let course_id = seed_open_course(&db, instructor).await;
        Enrollment::create(&db, learner, course_id).await.unwrap();

        let course = Course::find_by_id(&db, course_id).await.unwrap().unwrap();
        let domain = Domain::find_by_id(&db, course.domain_id)
            .await
            .unwrap()
            .unwrap();

        domain.delete(&db).await.unwrap();

        assert!(Domain::find_by_id(&db, domain.id).await.unwrap().is_none());
        assert!(Course::find_by_id(&db, course_id).await.unwrap().is_none());
        let enrollments: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM enrollments WHERE course_id = $1")
                .bind(course_id)
                .fetch_one(&db)
                .await
                .unwrap();
        assert_eq!(enrollments, 0);
    }
}
