//! Quiz request handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::authz::{self, Action, Resource};
use crate::error::AppError;
use crate::models::auth::AuthContext;
use crate::models::course::Course;
use crate::models::enrollment::{Enrollment, ProgressChange};
use crate::models::notification::Notification;
use crate::models::quiz::{self, CreateQuiz, QuestionView, Quiz, QuizForLearner, UpdateQuiz};
use crate::models::NotificationKind;
use crate::server::AppState;

/// Quiz submission request; answers are option indexes in question order
#[derive(Debug, Deserialize)]
pub struct SubmitQuizRequest {
    pub answers: Vec<i32>,
}

/// Check that the caller may author quizzes for this course
async fn require_quiz_author(
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
            "Only the course creator can manage its quizzes".to_string(),
        ));
    }

    Ok(())
}

/// List a course's quizzes
pub async fn list_quizzes(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Quiz, Action::Read)?;

    Course::find_by_id(&state.db_pool, course_id)
        .await?
        .ok_or_else(|| AppError::not_found("Course", course_id))?;

    let quizzes = Quiz::list_for_course(&state.db_pool, course_id).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": {
            "quizzes": quizzes
        }
    })))
}

/// Create a quiz with its questions
pub async fn create_quiz(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthContext>,
    Json(payload): Json<CreateQuiz>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Quiz, Action::Create)?;
    payload.validate()?;
    for question in &payload.questions {
        question.validate()?;
    }

    require_quiz_author(&state, payload.course_id, &auth_user).await?;

    let quiz = Quiz::create(&state.db_pool, payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "data": quiz
        })),
    ))
}

/// Get a quiz.
///
/// Learners get the questions without the correct answer indexes and
/// must be enrolled in the course; staff see the full quiz.
pub async fn get_quiz(
    State(state): State<AppState>,
    Path(quiz_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Quiz, Action::Read)?;

    let quiz = Quiz::get_with_questions(&state.db_pool, quiz_id).await?;

    if auth_user.is_learner() {
        Enrollment::find_for_learner(&state.db_pool, auth_user.user_id, quiz.quiz.course_id)
            .await?
            .ok_or_else(|| {
                AppError::Authorization("Enroll in the course to take its quizzes".to_string())
            })?;

        let learner_view = QuizForLearner {
            quiz: quiz.quiz,
            questions: quiz.questions.into_iter().map(QuestionView::from).collect(),
        };

        return Ok(Json(serde_json::json!({
            "success": true,
            "data": learner_view
        })));
    }

    Ok(Json(serde_json::json!({
        "success": true,
        "data": quiz
    })))
}

/// Update a quiz, optionally replacing its questions
pub async fn update_quiz(
    State(state): State<AppState>,
    Path(quiz_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthContext>,
    Json(payload): Json<UpdateQuiz>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Quiz, Action::Update)?;
    payload.validate()?;
    if let Some(questions) = &payload.questions {
        for question in questions {
            question.validate()?;
        }
    }

    let quiz = Quiz::find_by_id(&state.db_pool, quiz_id)
        .await?
        .ok_or_else(|| AppError::not_found("Quiz", quiz_id))?;

    require_quiz_author(&state, quiz.course_id, &auth_user).await?;

    let updated = quiz.update(&state.db_pool, payload).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "data": updated
    })))
}

/// Delete a quiz and its questions
pub async fn delete_quiz(
    State(state): State<AppState>,
    Path(quiz_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthContext>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Quiz, Action::Delete)?;

    let quiz = Quiz::find_by_id(&state.db_pool, quiz_id)
        .await?
        .ok_or_else(|| AppError::not_found("Quiz", quiz_id))?;

    require_quiz_author(&state, quiz.course_id, &auth_user).await?;

    quiz.delete(&state.db_pool).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Quiz deleted successfully"
    })))
}

/// Submit quiz answers.
///
/// The submission is graded against the stored questions, the learner's
/// progression advances by the configured policy, and crossing 100%
/// settles completion and the certificate in the same write.
pub async fn submit_quiz(
    State(state): State<AppState>,
    Path(quiz_id): Path<Uuid>,
    Extension(auth_user): Extension<AuthContext>,
    Json(payload): Json<SubmitQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    authz::require(&auth_user, Resource::Quiz, Action::Submit)?;

    let quiz = Quiz::find_by_id(&state.db_pool, quiz_id)
        .await?
        .ok_or_else(|| AppError::not_found("Quiz", quiz_id))?;

    let questions = Quiz::questions(&state.db_pool, quiz_id).await?;

    let grade = quiz::grade(
        &questions,
        &payload.answers,
        state.config.learning.pass_threshold,
    )?;

    let increment = state.config.learning.progression.increment(grade.passed);
    let report = Enrollment::record_progress(
        &state.db_pool,
        auth_user.user_id,
        quiz.course_id,
        ProgressChange::Increment(increment),
    )
    .await?;

    Notification::create(
        &state.db_pool,
        auth_user.user_id,
        NotificationKind::Progression,
        format!(
            "Quiz \"{}\": scored {:.0}%, progression now at {}%",
            quiz.title, grade.score, report.progression.percent
        ),
    )
    .await?;

    tracing::info!(
        quiz_id = %quiz_id,
        learner_id = %auth_user.user_id,
        score = grade.score,
        passed = grade.passed,
        "Quiz submitted"
    );

    Ok(Json(serde_json::json!({
        "success": true,
        "data": {
            "grade": grade,
            "progression": report.progression,
            "completed": report.completed,
            "certificate": report.certificate
        }
    })))
}
