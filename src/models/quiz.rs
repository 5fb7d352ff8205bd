//! Quiz models and grading

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::models::course::Course;
use crate::models::Entity;

/// A set of questions attached to a course
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Quiz {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Quiz {
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

/// A single question with its answer options
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Question {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer_index: i32,
    pub position: i32,
}

/// Learner-facing question view; the correct answer stays server-side
#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub id: Uuid,
    pub text: String,
    pub options: Vec<String>,
    pub position: i32,
}

impl From<Question> for QuestionView {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            text: q.text,
            options: q.options,
            position: q.position,
        }
    }
}

/// Quiz creation request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateQuiz {
    pub course_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1))]
    pub questions: Vec<CreateQuestion>,
}

/// Question creation payload
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateQuestion {
    #[validate(length(min = 1))]
    pub text: String,
    #[validate(length(min = 2))]
    pub options: Vec<String>,
    pub correct_answer_index: i32,
}

impl CreateQuestion {
    /// The correct answer must point at one of the options
    pub fn check_answer_index(&self) -> Result<(), AppError> {
        if self.correct_answer_index < 0 || self.correct_answer_index as usize >= self.options.len()
        {
            return Err(AppError::BadRequest(format!(
                "correct_answer_index {} is out of range for {} options",
                self.correct_answer_index,
                self.options.len()
            )));
        }
        Ok(())
    }
}

/// Quiz update request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateQuiz {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    /// When present, replaces the whole question set
    pub questions: Option<Vec<CreateQuestion>>,
}

/// Quiz with its questions, instructor view
#[derive(Debug, Clone, Serialize)]
pub struct QuizWithQuestions {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<Question>,
}

/// Quiz with learner-facing questions
#[derive(Debug, Clone, Serialize)]
pub struct QuizForLearner {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<QuestionView>,
}

/// Result of grading one submission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizGrade {
    pub score: f64,
    pub passed: bool,
    pub correct_count: usize,
    pub question_count: usize,
}

/// Grade a submission against the quiz questions.
///
/// Pure: score is the percentage of answers matching the stored correct
/// index, pass is score against the configured threshold. Questions are
/// compared in position order, so answers are positional too.
pub fn grade(questions: &[Question], answers: &[i32], threshold: f64) -> Result<QuizGrade, AppError> {
    if questions.is_empty() {
        return Err(AppError::BadRequest("Quiz has no questions".to_string()));
    }

    if answers.len() != questions.len() {
        return Err(AppError::BadRequest(format!(
            "Expected {} answers, got {}",
            questions.len(),
            answers.len()
        )));
    }

    let correct_count = questions
        .iter()
        .zip(answers.iter())
        .filter(|(q, a)| q.correct_answer_index == **a)
        .count();

    let score = correct_count as f64 / questions.len() as f64 * 100.0;

    Ok(QuizGrade {
        score,
        passed: score >= threshold,
        correct_count,
        question_count: questions.len(),
    })
}

impl Quiz {
    /// Create a quiz and its questions in one transaction
    pub async fn create(db: &sqlx::PgPool, create: CreateQuiz) -> Result<QuizWithQuestions, AppError> {
        Course::find_by_id(db, create.course_id)
            .await?
            .ok_or_else(|| AppError::not_found("Course", create.course_id))?;

        for question in &create.questions {
            question.check_answer_index()?;
        }

        let mut tx = db.begin().await.map_err(AppError::Database)?;

        let quiz = sqlx::query_as::<_, Quiz>(
            "INSERT INTO quizzes (course_id, title) VALUES ($1, $2) RETURNING *",
        )
        .bind(create.course_id)
        .bind(create.title)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        let mut questions = Vec::with_capacity(create.questions.len());
        for (position, question) in create.questions.into_iter().enumerate() {
            let inserted = sqlx::query_as::<_, Question>(
                r#"
                INSERT INTO quiz_questions (quiz_id, text, options, correct_answer_index, position)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
                "#,
            )
            .bind(quiz.id)
            .bind(question.text)
            .bind(question.options)
            .bind(question.correct_answer_index)
            .bind(position as i32)
            .fetch_one(&mut *tx)
            .await
            .map_err(AppError::Database)?;

            questions.push(inserted);
        }

        tx.commit().await.map_err(AppError::Database)?;

        Ok(QuizWithQuestions { quiz, questions })
    }

    /// Find quiz by ID
    pub async fn find_by_id(db: &sqlx::PgPool, quiz_id: Uuid) -> Result<Option<Self>, AppError> {
        let quiz = sqlx::query_as::<_, Quiz>("SELECT * FROM quizzes WHERE id = $1")
            .bind(quiz_id)
            .fetch_optional(db)
            .await
            .map_err(AppError::Database)?;

        Ok(quiz)
    }

    /// Questions of this quiz in position order
    pub async fn questions(db: &sqlx::PgPool, quiz_id: Uuid) -> Result<Vec<Question>, AppError> {
        let questions = sqlx::query_as::<_, Question>(
            "SELECT * FROM quiz_questions WHERE quiz_id = $1 ORDER BY position",
        )
        .bind(quiz_id)
        .fetch_all(db)
        .await
        .map_err(AppError::Database)?;

        Ok(questions)
    }

    /// Get quiz with its questions
    pub async fn get_with_questions(
        db: &sqlx::PgPool,
        quiz_id: Uuid,
    ) -> Result<QuizWithQuestions, AppError> {
        let quiz = Self::find_by_id(db, quiz_id)
            .await?
            .ok_or_else(|| AppError::not_found("Quiz", quiz_id))?;

        let questions = Self::questions(db, quiz_id).await?;

        Ok(QuizWithQuestions { quiz, questions })
    }

    /// List the quizzes of a course
    pub async fn list_for_course(db: &sqlx::PgPool, course_id: Uuid) -> Result<Vec<Self>, AppError> {
        let quizzes = sqlx::query_as::<_, Quiz>(
            "SELECT * FROM quizzes WHERE course_id = $1 ORDER BY created_at",
        )
        .bind(course_id)
        .fetch_all(db)
        .await
        .map_err(AppError::Database)?;

        Ok(quizzes)
    }

    /// Update title and optionally replace the question set
    pub async fn update(&self, db: &sqlx::PgPool, update: UpdateQuiz) -> Result<QuizWithQuestions, AppError> {
        if let Some(questions) = &update.questions {
            if questions.is_empty() {
                return Err(AppError::BadRequest(
                    "A quiz must keep at least one question".to_string(),
                ));
            }
            for question in questions {
                question.check_answer_index()?;
            }
        }

        let mut tx = db.begin().await.map_err(AppError::Database)?;

        let quiz = sqlx::query_as::<_, Quiz>(
            "UPDATE quizzes SET title = COALESCE($1, title), updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(update.title)
        .bind(self.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        let questions = match update.questions {
            Some(new_questions) => {
                sqlx::query("DELETE FROM quiz_questions WHERE quiz_id = $1")
                    .bind(self.id)
                    .execute(&mut *tx)
                    .await
                    .map_err(AppError::Database)?;

                let mut inserted_all = Vec::with_capacity(new_questions.len());
                for (position, question) in new_questions.into_iter().enumerate() {
                    let inserted = sqlx::query_as::<_, Question>(
                        r#"
                        INSERT INTO quiz_questions (quiz_id, text, options, correct_answer_index, position)
                        VALUES ($1, $2, $3, $4, $5)
                        RETURNING *
                        "#,
                    )
                    .bind(self.id)
                    .bind(question.text)
                    .bind(question.options)
                    .bind(question.correct_answer_index)
                    .bind(position as i32)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(AppError::Database)?;

                    inserted_all.push(inserted);
                }
                inserted_all
            }
            None => {
                sqlx::query_as::<_, Question>(
                    "SELECT * FROM quiz_questions WHERE quiz_id = $1 ORDER BY position",
                )
                .bind(self.id)
                .fetch_all(&mut *tx)
                .await
                .map_err(AppError::Database)?
            }
        };

        tx.commit().await.map_err(AppError::Database)?;

        Ok(QuizWithQuestions { quiz, questions })
    }

    /// Delete the quiz and its questions in one transaction
    pub async fn delete(&self, db: &sqlx::PgPool) -> Result<(), AppError> {
        let mut tx = db.begin().await.map_err(AppError::Database)?;

        sqlx::query("DELETE FROM quiz_questions WHERE quiz_id = $1")
            .bind(self.id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        sqlx::query("DELETE FROM quizzes WHERE id = $1")
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

    fn question(correct: i32, position: i32) -> Question {
        Question {
            id: Uuid::new_v4(),
            quiz_id: Uuid::new_v4(),
            text: format!("Question {}", position),
            options: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            correct_answer_index: correct,
            position,
        }
    }

    #[test]
    fn test_grade_all_correct() {
        let questions = vec![question(0, 0), question(2, 1), question(1, 2)];
        let grade = grade(&questions, &[0, 2, 1], 50.0).unwrap();
        assert_eq!(grade.score, 100.0);
        assert!(grade.passed);
        assert_eq!(grade.correct_count, 3);
    }

    #[test]
    fn test_grade_none_correct() {
        let questions = vec![question(0, 0), question(2, 1)];
        let grade = grade(&questions, &[1, 0], 50.0).unwrap();
        assert_eq!(grade.score, 0.0);
        assert!(!grade.passed);
        assert_eq!(grade.correct_count, 0);
    }

    #[test]
    fn test_grade_threshold_boundary() {
        let questions = vec![question(0, 0), question(0, 1)];
        // One of two correct is exactly 50%, which meets a 50% threshold
        let result = grade(&questions, &[0, 1], 50.0).unwrap();
        assert_eq!(result.score, 50.0);
        assert!(result.passed);

        let result = grade(&questions, &[0, 1], 60.0).unwrap();
        assert!(!result.passed);
    }

    #[test]
    fn test_grade_answer_count_mismatch() {
        let questions = vec![question(0, 0), question(1, 1)];
        assert!(grade(&questions, &[0], 50.0).is_err());
        assert!(grade(&[], &[], 50.0).is_err());
    }

    #[test]
    fn test_question_index_bounds() {
        let q = CreateQuestion {
            text: "Q".to_string(),
            options: vec!["a".to_string(), "b".to_string()],
            correct_answer_index: 2,
        };
        assert!(q.check_answer_index().is_err());

        let q = CreateQuestion {
            text: "Q".to_string(),
            options: vec!["a".to_string(), "b".to_string()],
            correct_answer_index: 1,
        };
        assert!(q.check_answer_index().is_ok());
    }

    #[test]
    fn test_question_view_hides_answer() {
        let q = question(1, 0);
        let view = QuestionView::from(q);
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("correct_answer_index").is_none());
        assert_eq!(json["options"].as_array().unwrap().len(), 3);
    }
}
