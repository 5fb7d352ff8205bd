//! Course models and lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::models::domain::Domain;
use crate::models::user::UserProfile;
use crate::models::{ApprovalStatus, CourseLevel, Entity, PaginationParams};

/// Course model, the central teachable unit
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub duration_hours: i32,
    pub domain_id: Uuid,
    pub creator_id: Option<Uuid>,
    pub level: CourseLevel,
    pub approval_status: ApprovalStatus,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Course {
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

impl Course {
    /// A course is visible to learners once approved and published
    pub fn is_open_for_enrollment(&self) -> bool {
        self.approval_status == ApprovalStatus::Approved && self.is_published
    }
}

/// Course creation request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCourse {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    #[validate(range(min = 1, max = 1000))]
    pub duration_hours: i32,
    pub domain_id: Uuid,
    pub level: CourseLevel,
}

/// Course update request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateCourse {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 1, max = 1000))]
    pub duration_hours: Option<i32>,
    pub domain_id: Option<Uuid>,
    pub level: Option<CourseLevel>,
}

/// Course listing filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CourseFilter {
    pub domain_id: Option<Uuid>,
    pub level: Option<CourseLevel>,
    pub published_only: Option<bool>,
}

/// Course with expanded relations, the hydrated form handlers return
#[derive(Debug, Clone, Serialize)]
pub struct CourseWithDetails {
    #[serde(flatten)]
    pub course: Course,
    pub domain: Domain,
    pub creator: Option<UserProfile>,
    pub content_ids: Vec<Uuid>,
    pub quiz_ids: Vec<Uuid>,
}

/// Per-course aggregate statistics
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CourseStats {
    pub course_id: Uuid,
    pub enrollments: i64,
    pub completions: i64,
    pub certificates: i64,
    pub average_progression: f64,
    pub content_count: i64,
    pub quiz_count: i64,
}

impl Course {
    /// Create a new course.
    ///
    /// The referenced domain must exist; the course set of the domain is
    /// derived from `domain_id`, so the insert itself is the whole write.
    pub async fn create(
        db: &sqlx::PgPool,
        creator_id: Uuid,
        create: CreateCourse,
        initial_status: ApprovalStatus,
    ) -> Result<Self, AppError> {
        Domain::find_by_id(db, create.domain_id)
            .await?
            .ok_or_else(|| AppError::not_found("Domain", create.domain_id))?;

        let course = sqlx::query_as::<_, Course>(
            r#"
            INSERT INTO courses (
                title, description, duration_hours, domain_id, creator_id,
                level, approval_status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(create.title)
        .bind(create.description)
        .bind(create.duration_hours)
        .bind(create.domain_id)
        .bind(creator_id)
        .bind(create.level)
        .bind(initial_status)
        .fetch_one(db)
        .await
        .map_err(AppError::Database)?;

        Ok(course)
    }

    /// Find course by ID
    pub async fn find_by_id(db: &sqlx::PgPool, course_id: Uuid) -> Result<Option<Self>, AppError> {
        let course = sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = $1")
            .bind(course_id)
            .fetch_optional(db)
            .await
            .map_err(AppError::Database)?;

        Ok(course)
    }

    /// List courses with optional filters
    pub async fn list(
        db: &sqlx::PgPool,
        filter: &CourseFilter,
        params: &PaginationParams,
    ) -> Result<Vec<Self>, AppError> {
        let published_only = filter.published_only.unwrap_or(false);

        let courses = sqlx::query_as::<_, Course>(
            r#"
            SELECT * FROM courses
            WHERE ($1::uuid IS NULL OR domain_id = $1)
              AND ($2::course_level IS NULL OR level = $2)
              AND (NOT $3 OR (approval_status = 'approved' AND is_published))
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(filter.domain_id)
        .bind(filter.level)
        .bind(published_only)
        .bind(params.limit() as i64)
        .bind(params.offset() as i64)
        .fetch_all(db)
        .await
        .map_err(AppError::Database)?;

        Ok(courses)
    }

    /// Count courses matching the filter
    pub async fn count(db: &sqlx::PgPool, filter: &CourseFilter) -> Result<i64, AppError> {
        let published_only = filter.published_only.unwrap_or(false);

        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM courses
            WHERE ($1::uuid IS NULL OR domain_id = $1)
              AND ($2::course_level IS NULL OR level = $2)
              AND (NOT $3 OR (approval_status = 'approved' AND is_published))
            "#,
        )
        .bind(filter.domain_id)
        .bind(filter.level)
        .bind(published_only)
        .fetch_one(db)
        .await
        .map_err(AppError::Database)?;

        Ok(count)
    }

    /// Courses created by one instructor
    pub async fn list_for_creator(
        db: &sqlx::PgPool,
        creator_id: Uuid,
        params: &PaginationParams,
    ) -> Result<Vec<Self>, AppError> {
        let courses = sqlx::query_as::<_, Course>(
            r#"
            SELECT * FROM courses
            WHERE creator_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(creator_id)
        .bind(params.limit() as i64)
        .bind(params.offset() as i64)
        .fetch_all(db)
        .await
        .map_err(AppError::Database)?;

        Ok(courses)
    }

    /// Check if a user is the creator of a course
    pub async fn is_creator(
        db: &sqlx::PgPool,
        course_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM courses WHERE id = $1 AND creator_id = $2",
        )
        .bind(course_id)
        .bind(user_id)
        .fetch_one(db)
        .await
        .map_err(AppError::Database)?;

        Ok(count > 0)
    }

    /// Update course fields; a changed domain must exist
    pub async fn update(&self, db: &sqlx::PgPool, update: UpdateCourse) -> Result<Self, AppError> {
        if let Some(domain_id) = update.domain_id {
            Domain::find_by_id(db, domain_id)
                .await?
                .ok_or_else(|| AppError::not_found("Domain", domain_id))?;
        }

        let course = sqlx::query_as::<_, Course>(
            r#"
            UPDATE courses SET
                title = COALESCE($1, title),
                description = COALESCE($2, description),
                duration_hours = COALESCE($3, duration_hours),
                domain_id = COALESCE($4, domain_id),
                level = COALESCE($5, level),
                updated_at = NOW()
            WHERE id = $6
            RETURNING *
            "#,
        )
        .bind(update.title)
        .bind(update.description)
        .bind(update.duration_hours)
        .bind(update.domain_id)
        .bind(update.level)
        .bind(self.id)
        .fetch_one(db)
        .await
        .map_err(AppError::Database)?;

        Ok(course)
    }

    /// Move the course through its approval workflow
    pub async fn set_approval_status(
        &self,
        db: &sqlx::PgPool,
        status: ApprovalStatus,
    ) -> Result<Self, AppError> {
        let course = sqlx::query_as::<_, Course>(
            "UPDATE courses SET approval_status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(status)
        .bind(self.id)
        .fetch_one(db)
        .await
        .map_err(AppError::Database)?;

        Ok(course)
    }

    /// Toggle publication independently of the approval workflow
    pub async fn set_published(&self, db: &sqlx::PgPool, published: bool) -> Result<Self, AppError> {
        let course = sqlx::query_as::<_, Course>(
            "UPDATE courses SET is_published = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(published)
        .bind(self.id)
        .fetch_one(db)
        .await
        .map_err(AppError::Database)?;

        Ok(course)
    }

    /// Delete a course and everything referencing it.
    ///
    /// Questions, quizzes, contents and the learner records (enrollments,
    /// progressions, certificates) go in the same transaction as the
    /// course row, so a half-applied cascade cannot be observed and no
    /// foreign key is left dangling. Certificates are revoked with the
    /// course: an attestation for a course that no longer exists cannot
    /// be rendered or verified.
    pub async fn delete(&self, db: &sqlx::PgPool) -> Result<(), AppError> {
        let mut tx = db.begin().await.map_err(AppError::Database)?;

        sqlx::query(
            "DELETE FROM quiz_questions WHERE quiz_id IN (SELECT id FROM quizzes WHERE course_id = $1)",
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
            sqlx::query(&format!("DELETE FROM {} WHERE course_id = $1", table))
                .bind(self.id)
                .execute(&mut *tx)
                .await
                .map_err(AppError::Database)?;
        }

        sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(self.id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;

        Ok(())
    }

    /// Get course with expanded relations
    pub async fn get_with_details(
        db: &sqlx::PgPool,
        course_id: Uuid,
    ) -> Result<CourseWithDetails, AppError> {
        let course = Self::find_by_id(db, course_id)
            .await?
            .ok_or_else(|| AppError::not_found("Course", course_id))?;

        let domain = Domain::find_by_id(db, course.domain_id)
            .await?
            .ok_or_else(|| AppError::not_found("Domain", course.domain_id))?;

        let creator = match course.creator_id {
            Some(creator_id) => sqlx::query_as::<_, UserProfile>(
                r#"
                SELECT id, username, email, display_name, role, is_active,
                       last_login_at, created_at
                FROM users
                WHERE id = $1
                "#,
            )
            .bind(creator_id)
            .fetch_optional(db)
            .await
            .map_err(AppError::Database)?,
            None => None,
        };

        let content_ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM contents WHERE course_id = $1 ORDER BY position",
        )
        .bind(course_id)
        .fetch_all(db)
        .await
        .map_err(AppError::Database)?;

        let quiz_ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM quizzes WHERE course_id = $1 ORDER BY created_at",
        )
        .bind(course_id)
        .fetch_all(db)
        .await
        .map_err(AppError::Database)?;

        Ok(CourseWithDetails {
            course,
            domain,
            creator,
            content_ids,
            quiz_ids,
        })
    }

    /// Course count for one approval status
    pub async fn count_by_status(
        db: &sqlx::PgPool,
        status: ApprovalStatus,
    ) -> Result<i64, AppError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM courses WHERE approval_status = $1")
                .bind(status)
                .fetch_one(db)
                .await
                .map_err(AppError::Database)?;

        Ok(count)
    }

    /// Aggregate statistics for one course
    pub async fn stats(db: &sqlx::PgPool, course_id: Uuid) -> Result<CourseStats, AppError> {
        let stats = sqlx::query_as::<_, CourseStats>(
            r#"
            SELECT
                $1 as course_id,
                (SELECT COUNT(*) FROM enrollments WHERE course_id = $1) as enrollments,
                (SELECT COUNT(*) FROM enrollments
                 WHERE course_id = $1 AND status = 'completed') as completions,
                (SELECT COUNT(*) FROM certificates WHERE course_id = $1) as certificates,
                COALESCE((SELECT AVG(percent)::float8 FROM progressions
                          WHERE course_id = $1), 0) as average_progression,
                (SELECT COUNT(*) FROM contents WHERE course_id = $1) as content_count,
                (SELECT COUNT(*) FROM quizzes WHERE course_id = $1) as quiz_count
            "#,
        )
        .bind(course_id)
        .fetch_one(db)
        .await
        .map_err(AppError::Database)?;

        Ok(stats)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn sample_course(status: ApprovalStatus, published: bool) -> Course {
        Course {
            id: Uuid::new_v4(),
            title: "Intro".to_string(),
            description: None,
            duration_hours: 10,
            domain_id: Uuid::new_v4(),
            creator_id: None,
            level: CourseLevel::Alfa,
            approval_status: status,
            is_published: published,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_create_course_validation() {
        let create = CreateCourse {
            title: "".to_string(),
            description: None,
            duration_hours: 10,
            domain_id: Uuid::new_v4(),
            level: CourseLevel::Alfa,
        };
        assert!(create.validate().is_err());

        let create = CreateCourse {
            title: "Intro".to_string(),
            description: None,
            duration_hours: 0,
            domain_id: Uuid::new_v4(),
            level: CourseLevel::Alfa,
        };
        assert!(create.validate().is_err());

        let create = CreateCourse {
            title: "Intro".to_string(),
            description: Some("Premiers pas".to_string()),
            duration_hours: 10,
            domain_id: Uuid::new_v4(),
            level: CourseLevel::Alfa,
        };
        assert!(create.validate().is_ok());
    }

    #[test]
    fn test_open_for_enrollment() {
        assert!(sample_course(ApprovalStatus::Approved, true).is_open_for_enrollment());
        assert!(!sample_course(ApprovalStatus::Approved, false).is_open_for_enrollment());
        assert!(!sample_course(ApprovalStatus::Pending, true).is_open_for_enrollment());
        assert!(!sample_course(ApprovalStatus::Rejected, true).is_open_for_enrollment());
    }

    pub(crate) async fn seed_user(db: &sqlx::PgPool, role: &str) -> Uuid {
        let tag = Uuid::new_v4().simple().to_string();
        sqlx::query_scalar(
            r#"
            INSERT INTO users (username, email, password_hash, display_name, role)
            VALUES ($1, $2, 'not-a-real-hash', 'Test User', $3::user_role)
            RETURNING id
            "#,
        )
        .bind(format!("u{}", &tag[..12]))
        .bind(format!("{}@example.test", &tag[..12]))
        .bind(role)
        .fetch_one(db)
        .await
        .unwrap()
    }

    pub(crate) async fn seed_open_course(db: &sqlx::PgPool, creator_id: Uuid) -> Uuid {
        let domain_id: Uuid =
            sqlx::query_scalar("INSERT INTO domains (name) VALUES ($1) RETURNING id")
                .bind(format!("Domain {}", Uuid::new_v4().simple()))
                .fetch_one(db)
                .await
                .unwrap();

        sqlx::query_scalar(
            r#"
            INSERT INTO courses (
                title, duration_hours, domain_id, creator_id,
                level, approval_status, is_published
            ) VALUES ('Rust fundamentals', 10, $1, $2, 'alfa', 'approved', TRUE)
            RETURNING id
            "#,
        )
        .bind(domain_id)
        .bind(creator_id)
        .fetch_one(db)
        .await
        .unwrap()
    }

    async fn rows_for_course(db: &sqlx::PgPool, table: &str, course_id: Uuid) -> i64 {
        sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE course_id = $1",
            table
        ))
        .bind(course_id)
        .fetch_one(db)
        .await
        .unwrap()
    }

    #[sqlx::test]
    async fn test_delete_course_with_learner_records(db: sqlx::PgPool) {
        use crate::models::enrollment::{Enrollment, ProgressChange};

        let instructor = seed_user(&db, "instructor").await;
        let learner = seed_user(&db, "learner").await;
        let course_id = seed_open_course(&db, instructor).await;

        let quiz_id: Uuid = sqlx::query_scalar(
            "INSERT INTO quizzes (course_id, title) VALUES ($1, 'Final quiz') RETURNING id",
        )
        .bind(course_id)
        .fetch_one(&db)
        .await
        .unwrap();
        sqlx::query(
            r#"
            INSERT INTO quiz_questions (quiz_id, text, options, correct_answer_index, position)
            VALUES ($1, 'Q1', ARRAY['a', 'b'], 0, 0)
            "#,
        )
        .bind(quiz_id)
        .execute(&db)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO contents (course_id, title, kind, position) VALUES ($1, 'Intro', 'text', 0)",
        )
        .bind(course_id)
        .execute(&db)
        .await
        .unwrap();

        // A learner all the way through: enrollment, progression, certificate
        Enrollment::create(&db, learner, course_id).await.unwrap();
        Enrollment::record_progress(&db, learner, course_id, ProgressChange::Floor(100))
            .await
            .unwrap();

        let course = Course::find_by_id(&db, course_id).await.unwrap().unwrap();
        course.delete(&db).await.unwrap();

        assert!(Course::find_by_id(&db, course_id).await.unwrap().is_none());
        for table in [
            "enrollments",
            "progressions",
            "certificates",
            "contents",
            "quizzes",
        ] {
            assert_eq!(rows_for_course(&db, table, course_id).await, 0, "{}", table);
        }
        let questions: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM quiz_questions WHERE quiz_id = $1")
                .bind(quiz_id)
                .fetch_one(&db)
                .await
                .unwrap();
        assert_eq!(questions, 0);
    }
}
