//! Enrollment, progression and certificate models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::auth::PasswordUtils;
use crate::models::course::Course;
use crate::models::{EnrollmentStatus, NotificationKind, PaginationParams};

const CERTIFICATE_SERIAL_LEN: usize = 16;

/// A learner's membership in a course
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Enrollment {
    pub id: Uuid,
    pub learner_id: Uuid,
    pub course_id: Uuid,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A learner's advancement through a course, 0 to 100 percent.
///
/// Percent only ever moves forward; every write goes through GREATEST
/// so a stale or replayed update can never lower it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Progression {
    pub id: Uuid,
    pub learner_id: Uuid,
    pub course_id: Uuid,
    pub percent: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Proof of course completion
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Certificate {
    pub id: Uuid,
    pub learner_id: Uuid,
    pub course_id: Uuid,
    pub serial: String,
    pub issued_at: DateTime<Utc>,
}

/// Enrollment hydrated with its course and current progression
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentWithCourse {
    #[serde(flatten)]
    pub enrollment: Enrollment,
    pub course: Course,
    pub progression_percent: i32,
}

/// How a progress write moves the percent
#[derive(Debug, Clone, Copy)]
pub enum ProgressChange {
    /// Add points on top of the current percent
    Increment(i32),
    /// Raise the percent to at least this value
    Floor(i32),
}

/// Outcome of one progress update
#[derive(Debug, Clone, Serialize)]
pub struct ProgressReport {
    pub progression: Progression,
    pub completed: bool,
    pub certificate: Option<Certificate>,
}

/// Certificate hydrated with course title for display
#[derive(Debug, Clone, Serialize)]
pub struct CertificateWithCourse {
    #[serde(flatten)]
    pub certificate: Certificate,
    pub course_title: String,
}

impl Enrollment {
    /// Enroll a learner in a course.
    ///
    /// The course must be approved and published. The enrollment and its
    /// zeroed progression are created in one transaction; the unique index
    /// on (learner_id, course_id) turns a double enroll into a Conflict.
    pub async fn create(
        db: &sqlx::PgPool,
        learner_id: Uuid,
        course_id: Uuid,
    ) -> Result<Self, AppError> {
        let course = Course::find_by_id(db, course_id)
            .await?
            .ok_or_else(|| AppError::not_found("Course", course_id))?;

        if !course.is_open_for_enrollment() {
            return Err(AppError::BadRequest(
                "Course is not open for enrollment".to_string(),
            ));
        }

        let mut tx = db.begin().await.map_err(AppError::Database)?;

        let enrollment = sqlx::query_as::<_, Enrollment>(
            r#"
            INSERT INTO enrollments (learner_id, course_id)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(learner_id)
        .bind(course_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("Already enrolled in this course".to_string())
            }
            _ => AppError::Database(e),
        })?;

        sqlx::query(
            r#"
            INSERT INTO progressions (learner_id, course_id, percent)
            VALUES ($1, $2, 0)
            ON CONFLICT (learner_id, course_id) DO NOTHING
            "#,
        )
        .bind(learner_id)
        .bind(course_id)
        .execute(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;

        Ok(enrollment)
    }

    /// Find enrollment by ID
    pub async fn find_by_id(
        db: &sqlx::PgPool,
        enrollment_id: Uuid,
    ) -> Result<Option<Self>, AppError> {
        let enrollment =
            sqlx::query_as::<_, Enrollment>("SELECT * FROM enrollments WHERE id = $1")
                .bind(enrollment_id)
                .fetch_optional(db)
                .await
                .map_err(AppError::Database)?;

        Ok(enrollment)
    }

    /// Find a learner's enrollment in a course
    pub async fn find_for_learner(
        db: &sqlx::PgPool,
        learner_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Self>, AppError> {
        let enrollment = sqlx::query_as::<_, Enrollment>(
            "SELECT * FROM enrollments WHERE learner_id = $1 AND course_id = $2",
        )
        .bind(learner_id)
        .bind(course_id)
        .fetch_optional(db)
        .await
        .map_err(AppError::Database)?;

        Ok(enrollment)
    }

    /// List a learner's enrollments with course and progression
    pub async fn list_for_learner(
        db: &sqlx::PgPool,
        learner_id: Uuid,
        params: &PaginationParams,
    ) -> Result<Vec<EnrollmentWithCourse>, AppError> {
        let enrollments = sqlx::query_as::<_, Enrollment>(
            "SELECT * FROM enrollments WHERE learner_id = $1 ORDER BY enrolled_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(learner_id)
        .bind(params.limit() as i64)
        .bind(params.offset() as i64)
        .fetch_all(db)
        .await
        .map_err(AppError::Database)?;

        let mut hydrated = Vec::with_capacity(enrollments.len());
        for enrollment in enrollments {
            let course = Course::find_by_id(db, enrollment.course_id)
                .await?
                .ok_or_else(|| AppError::not_found("Course", enrollment.course_id))?;

            let percent = Progression::percent_for(db, learner_id, enrollment.course_id).await?;

            hydrated.push(EnrollmentWithCourse {
                enrollment,
                course,
                progression_percent: percent,
            });
        }

        Ok(hydrated)
    }

    /// Learner ids enrolled in a course, for notification fan-out
    pub async fn learner_ids_for_course(
        db: &sqlx::PgPool,
        course_id: Uuid,
    ) -> Result<Vec<Uuid>, AppError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT learner_id FROM enrollments WHERE course_id = $1 AND status = 'active'",
        )
        .bind(course_id)
        .fetch_all(db)
        .await
        .map_err(AppError::Database)?;

        Ok(ids)
    }

    /// Cancel this enrollment
    pub async fn cancel(&self, db: &sqlx::PgPool) -> Result<Self, AppError> {
        if self.status == EnrollmentStatus::Completed {
            return Err(AppError::BadRequest(
                "Cannot cancel a completed enrollment".to_string(),
            ));
        }

        let enrollment = sqlx::query_as::<_, Enrollment>(
            "UPDATE enrollments SET status = 'cancelled', updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(self.id)
        .fetch_one(db)
        .await
        .map_err(AppError::Database)?;

        Ok(enrollment)
    }

    /// Advance a learner's progression and settle completion.
    ///
    /// Runs in one transaction: the progression moves forward (never back,
    /// capped at 100), and on reaching 100 the enrollment flips to
    /// completed, a certificate is issued idempotently and the learner is
    /// notified. Calling this again after completion is harmless.
    pub async fn record_progress(
        db: &sqlx::PgPool,
        learner_id: Uuid,
        course_id: Uuid,
        change: ProgressChange,
    ) -> Result<ProgressReport, AppError> {
        let enrollment = Self::find_for_learner(db, learner_id, course_id)
            .await?
            .ok_or_else(|| AppError::BadRequest("Not enrolled in this course".to_string()))?;

        if enrollment.status == EnrollmentStatus::Cancelled {
            return Err(AppError::BadRequest(
                "Enrollment has been cancelled".to_string(),
            ));
        }

        let mut tx = db.begin().await.map_err(AppError::Database)?;

        let (sql, value) = match change {
            ProgressChange::Increment(points) => (
                r#"
                UPDATE progressions SET
                    percent = LEAST(100, percent + $3),
                    updated_at = NOW()
                WHERE learner_id = $1 AND course_id = $2
                RETURNING *
                "#,
                points.max(0),
            ),
            ProgressChange::Floor(target) => (
                r#"
                UPDATE progressions SET
                    percent = LEAST(100, GREATEST(percent, $3)),
                    updated_at = NOW()
                WHERE learner_id = $1 AND course_id = $2
                RETURNING *
                "#,
                target.clamp(0, 100),
            ),
        };

        let progression = sqlx::query_as::<_, Progression>(sql)
            .bind(learner_id)
            .bind(course_id)
            .bind(value)
            .fetch_one(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        let mut certificate = None;
        let completed = progression.percent >= 100;

        if completed {
            sqlx::query(
                "UPDATE enrollments SET status = 'completed', updated_at = NOW() WHERE id = $1 AND status = 'active'",
            )
            .bind(enrollment.id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;

            let inserted = sqlx::query_as::<_, Certificate>(
                r#"
                INSERT INTO certificates (learner_id, course_id, serial)
                VALUES ($1, $2, $3)
                ON CONFLICT (learner_id, course_id) DO NOTHING
                RETURNING *
                "#,
            )
            .bind(learner_id)
            .bind(course_id)
            .bind(PasswordUtils::generate_serial(CERTIFICATE_SERIAL_LEN))
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::Database)?;

            // Only the write that actually issued the certificate notifies
            if let Some(cert) = inserted {
                sqlx::query(
                    "INSERT INTO notifications (user_id, kind, message) VALUES ($1, $2, $3)",
                )
                .bind(learner_id)
                .bind(NotificationKind::Certificate)
                .bind(format!(
                    "Congratulations! Your certificate {} has been issued.",
                    cert.serial
                ))
                .execute(&mut *tx)
                .await
                .map_err(AppError::Database)?;

                certificate = Some(cert);
            }
        }

        tx.commit().await.map_err(AppError::Database)?;

        Ok(ProgressReport {
            progression,
            completed,
            certificate,
        })
    }
}

impl Progression {
    /// Current percent for a learner in a course, 0 when absent
    pub async fn percent_for(
        db: &sqlx::PgPool,
        learner_id: Uuid,
        course_id: Uuid,
    ) -> Result<i32, AppError> {
        let percent = sqlx::query_scalar::<_, i32>(
            "SELECT percent FROM progressions WHERE learner_id = $1 AND course_id = $2",
        )
        .bind(learner_id)
        .bind(course_id)
        .fetch_optional(db)
        .await
        .map_err(AppError::Database)?;

        Ok(percent.unwrap_or(0))
    }

    /// Find a learner's progression in a course
    pub async fn find_for_learner(
        db: &sqlx::PgPool,
        learner_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Self>, AppError> {
        let progression = sqlx::query_as::<_, Progression>(
            "SELECT * FROM progressions WHERE learner_id = $1 AND course_id = $2",
        )
        .bind(learner_id)
        .bind(course_id)
        .fetch_optional(db)
        .await
        .map_err(AppError::Database)?;

        Ok(progression)
    }
}

impl Certificate {
    /// Find certificate by ID
    pub async fn find_by_id(
        db: &sqlx::PgPool,
        certificate_id: Uuid,
    ) -> Result<Option<Self>, AppError> {
        let certificate =
            sqlx::query_as::<_, Certificate>("SELECT * FROM certificates WHERE id = $1")
                .bind(certificate_id)
                .fetch_optional(db)
                .await
                .map_err(AppError::Database)?;

        Ok(certificate)
    }

    /// Find certificate by its serial
    pub async fn find_by_serial(
        db: &sqlx::PgPool,
        serial: &str,
    ) -> Result<Option<Self>, AppError> {
        let certificate =
            sqlx::query_as::<_, Certificate>("SELECT * FROM certificates WHERE serial = $1")
                .bind(serial)
                .fetch_optional(db)
                .await
                .map_err(AppError::Database)?;

        Ok(certificate)
    }

    /// List a learner's certificates with course titles
    pub async fn list_for_learner(
        db: &sqlx::PgPool,
        learner_id: Uuid,
    ) -> Result<Vec<CertificateWithCourse>, AppError> {
        let rows = sqlx::query_as::<_, Certificate>(
            "SELECT * FROM certificates WHERE learner_id = $1 ORDER BY issued_at DESC",
        )
        .bind(learner_id)
        .fetch_all(db)
        .await
        .map_err(AppError::Database)?;

        let mut hydrated = Vec::with_capacity(rows.len());
        for certificate in rows {
            let title = sqlx::query_scalar::<_, String>("SELECT title FROM courses WHERE id = $1")
                .bind(certificate.course_id)
                .fetch_one(db)
                .await
                .map_err(AppError::Database)?;

            hydrated.push(CertificateWithCourse {
                certificate,
                course_title: title,
            });
        }

        Ok(hydrated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enrollment_status_serialization() {
        assert_eq!(
            serde_json::to_string(&EnrollmentStatus::Active).unwrap(),
            "\"active\""
        );
        assert_eq!(
            serde_json::to_string(&EnrollmentStatus::Completed).unwrap(),
            "\"completed\""
        );
    }

    #[test]
    fn test_enrollment_with_course_serialization() {
        let enrollment = Enrollment {
            id: Uuid::new_v4(),
            learner_id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            status: EnrollmentStatus::Active,
            enrolled_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&enrollment).unwrap();
        assert_eq!(json["status"], "active");
    }

    #[test]
    fn test_certificate_serial_length() {
        let serial = PasswordUtils::generate_serial(CERTIFICATE_SERIAL_LEN);
        assert_eq!(serial.len(), 16);
    }

    #[sqlx::test]
    async fn test_completion_issues_exactly_one_certificate(db: sqlx::PgPool) {
        use crate::models::course::tests::{seed_open_course, seed_user};

        let instructor = seed_user(&db, "instructor").await;
        let learner = seed_user(&db, "learner").await;
        let course_id = seed_open_course(&db, instructor).await;
        Enrollment::create(&db, learner, course_id).await.unwrap();

        let first = Enrollment::record_progress(&db, learner, course_id, ProgressChange::Floor(100))
            .await
            .unwrap();
        assert!(first.completed);
        assert!(first.certificate.is_some());

        // Further progress writes after completion change nothing
        let again =
            Enrollment::record_progress(&db, learner, course_id, ProgressChange::Increment(20))
                .await
                .unwrap();
        assert!(again.completed);
        assert!(again.certificate.is_none());
        assert_eq!(again.progression.percent, 100);

        let certificates: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM certificates WHERE learner_id = $1 AND course_id = $2",
        )
        .bind(learner)
        .bind(course_id)
        .fetch_one(&db)
        .await
        .unwrap();
        assert_eq!(certificates, 1);

        let notified: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND kind = 'certificate'",
        )
        .bind(learner)
        .fetch_one(&db)
        .await
        .unwrap();
        assert_eq!(notified, 1);

        let enrollment = Enrollment::find_for_learner(&db, learner, course_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(enrollment.status, EnrollmentStatus::Completed);
    }

    #[sqlx::test]
    async fn test_progression_never_moves_backwards(db: sqlx::PgPool) {
        use crate::models::course::tests::{seed_open_course, seed_user};

        let instructor = seed_user(&db, "instructor").await;
        let learner = seed_user(&db, "learner").await;
        let course_id = seed_open_course(&db, instructor).await;
        Enrollment::create(&db, learner, course_id).await.unwrap();

        let report = Enrollment::record_progress(&db, learner, course_id, ProgressChange::Floor(30))
            .await
            .unwrap();
        assert_eq!(report.progression.percent, 30);
        assert!(!report.completed);

        let stale = Enrollment::record_progress(&db, learner, course_id, ProgressChange::Floor(10))
            .await
            .unwrap();
        assert_eq!(stale.progression.percent, 30);
    }
}
