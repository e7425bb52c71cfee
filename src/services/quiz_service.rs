use chrono::{Duration, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::quiz_dto::AnswerReview;
use crate::error::{Error, Result};
use crate::models::enrollment::Enrollment;
use crate::models::quiz::{Quiz, QuizQuestion};
use crate::models::quiz_answer::QuizAnswer;
use crate::models::quiz_attempt::QuizAttempt;
use crate::services::enrollment_service::EnrollmentService;
use crate::services::grading_service::GradingService;

#[derive(Clone)]
pub struct QuizService {
    pool: PgPool,
    enrollments: EnrollmentService,
}

impl QuizService {
    pub fn new(pool: PgPool, enrollments: EnrollmentService) -> Self {
        Self { pool, enrollments }
    }

    /// Opens a new attempt. Retakes are unrestricted, so prior attempts never
    /// block a new one. Starting an attempt also moves a freshly enrolled
    /// student to 'in_progress'.
    pub async fn start_attempt(
        &self,
        student_id: Uuid,
        quiz_id: Uuid,
        enrollment_id: Uuid,
    ) -> Result<QuizAttempt> {
        let enrollment = self.enrollments.get_by_id(enrollment_id).await?;
        if enrollment.student_id != student_id {
            return Err(Error::Forbidden(
                "Enrollment belongs to another student".to_string(),
            ));
        }

        let (_quiz, course_id) = self.quiz_with_course(quiz_id).await?;
        if course_id != enrollment.course_id {
            return Err(Error::BadRequest(
                "Quiz does not belong to the enrolled course".to_string(),
            ));
        }

        let total_questions: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM quiz_questions WHERE quiz_id = $1"#,
        )
        .bind(quiz_id)
        .fetch_one(&self.pool)
        .await?;

        let mut tx = self.pool.begin().await?;

        let attempt = sqlx::query_as::<_, QuizAttempt>(
            r#"
            INSERT INTO quiz_attempts (quiz_id, enrollment_id, total_questions)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(quiz_id)
        .bind(enrollment_id)
        .bind(total_questions as i32)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE enrollments
            SET status = 'in_progress', started_at = COALESCE(started_at, NOW()), updated_at = NOW()
            WHERE id = $1 AND status = 'enrolled'
            "#,
        )
        .bind(enrollment_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(attempt)
    }

    /// Records an answer and grades it immediately. Resubmitting the same
    /// question replaces the stored answer and its correctness; the
    /// (attempt_id, question_id) unique constraint keeps concurrent
    /// submissions at one row with last-write-wins. The attempt is re-read
    /// under lock inside the transaction, so an attempt completed
    /// concurrently takes no late answers.
    pub async fn submit_answer(
        &self,
        student_id: Uuid,
        attempt_id: Uuid,
        question_id: Uuid,
        answer: JsonValue,
        time_spent_seconds: i32,
    ) -> Result<QuizAnswer> {
        let (attempt, _enrollment) = self.owned_attempt(attempt_id, student_id).await?;

        if attempt.completed_at.is_some() {
            return Err(Error::Conflict("Attempt is already completed".to_string()));
        }

        let quiz = self.get_quiz(attempt.quiz_id).await?;
        if let Some(limit) = quiz.time_limit_minutes {
            if Utc::now() > attempt.started_at + Duration::minutes(limit as i64) {
                return Err(Error::Conflict(
                    "Time limit for this attempt has expired".to_string(),
                ));
            }
        }

        let question = sqlx::query_as::<_, QuizQuestion>(
            r#"SELECT * FROM quiz_questions WHERE id = $1"#,
        )
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Question not found".to_string()))?;

        if question.quiz_id != attempt.quiz_id {
            return Err(Error::BadRequest(
                "Question does not belong to the attempt's quiz".to_string(),
            ));
        }

        let is_correct = GradingService::check_answer(&question, &answer);

        let mut tx = self.pool.begin().await?;

        // Re-checked under the row lock: an attempt completed after the
        // fast-path check above takes no further answers.
        let attempt = sqlx::query_as::<_, QuizAttempt>(
            r#"SELECT * FROM quiz_attempts WHERE id = $1 FOR UPDATE"#,
        )
        .bind(attempt_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound("Attempt not found".to_string()))?;

        if attempt.completed_at.is_some() {
            return Err(Error::Conflict("Attempt is already completed".to_string()));
        }

        let saved = sqlx::query_as::<_, QuizAnswer>(
            r#"
            INSERT INTO quiz_answers (attempt_id, question_id, answer, is_correct, time_spent_seconds)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (attempt_id, question_id) DO UPDATE
            SET answer = EXCLUDED.answer,
                is_correct = EXCLUDED.is_correct,
                time_spent_seconds = EXCLUDED.time_spent_seconds,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(attempt_id)
        .bind(question_id)
        .bind(&answer)
        .bind(is_correct)
        .bind(time_spent_seconds)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE enrollments
            SET time_spent_seconds = time_spent_seconds + $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(attempt.enrollment_id)
        .bind(time_spent_seconds)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(saved)
    }

    /// Closes the attempt and freezes its score. The row lock makes a
    /// concurrent second call wait and then fail on the completed_at check,
    /// so a recorded score never changes afterwards. Course completion is
    /// re-evaluated once the attempt is closed.
    pub async fn complete_attempt(
        &self,
        student_id: Uuid,
        attempt_id: Uuid,
    ) -> Result<AttemptOutcome> {
        let mut tx = self.pool.begin().await?;

        let attempt = sqlx::query_as::<_, QuizAttempt>(
            r#"SELECT * FROM quiz_attempts WHERE id = $1 FOR UPDATE"#,
        )
        .bind(attempt_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound("Attempt not found".to_string()))?;

        let enrollment = sqlx::query_as::<_, Enrollment>(
            r#"SELECT * FROM enrollments WHERE id = $1"#,
        )
        .bind(attempt.enrollment_id)
        .fetch_one(&mut *tx)
        .await?;

        if enrollment.student_id != student_id {
            return Err(Error::Forbidden(
                "Attempt belongs to another student".to_string(),
            ));
        }

        if attempt.completed_at.is_some() {
            return Err(Error::Conflict("Attempt is already completed".to_string()));
        }

        let quiz = sqlx::query_as::<_, Quiz>(r#"SELECT * FROM quizzes WHERE id = $1"#)
            .bind(attempt.quiz_id)
            .fetch_one(&mut *tx)
            .await?;

        let questions = sqlx::query_as::<_, QuizQuestion>(
            r#"SELECT * FROM quiz_questions WHERE quiz_id = $1 ORDER BY order_index"#,
        )
        .bind(attempt.quiz_id)
        .fetch_all(&mut *tx)
        .await?;

        let answers = sqlx::query_as::<_, QuizAnswer>(
            r#"SELECT * FROM quiz_answers WHERE attempt_id = $1"#,
        )
        .bind(attempt_id)
        .fetch_all(&mut *tx)
        .await?;

        let (score, passed) =
            GradingService::score_attempt(&questions, &answers, quiz.passing_score);

        let attempt = sqlx::query_as::<_, QuizAttempt>(
            r#"
            UPDATE quiz_attempts
            SET completed_at = NOW(), score = $2, passed = $3, total_questions = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(attempt_id)
        .bind(score)
        .bind(passed)
        .bind(questions.len() as i32)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            "Attempt {} completed with score {} ({})",
            attempt.id,
            score,
            if passed { "passed" } else { "failed" }
        );

        self.enrollments
            .evaluate_course_completion(attempt.enrollment_id)
            .await?;

        let review = if quiz.show_correct_answers {
            Some(Self::build_review(&questions, &answers))
        } else {
            None
        };

        Ok(AttemptOutcome {
            score,
            total_questions: questions.len() as i32,
            passed,
            review,
        })
    }

    pub async fn get_attempt(
        &self,
        student_id: Uuid,
        attempt_id: Uuid,
    ) -> Result<(QuizAttempt, Vec<QuizAnswer>)> {
        let (attempt, _enrollment) = self.owned_attempt(attempt_id, student_id).await?;

        let answers = sqlx::query_as::<_, QuizAnswer>(
            r#"SELECT * FROM quiz_answers WHERE attempt_id = $1 ORDER BY created_at"#,
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;

        Ok((attempt, answers))
    }

    fn build_review(questions: &[QuizQuestion], answers: &[QuizAnswer]) -> Vec<AnswerReview> {
        questions
            .iter()
            .map(|q| {
                let answer = answers.iter().find(|a| a.question_id == q.id);
                AnswerReview {
                    question_id: q.id,
                    prompt: q.prompt.clone(),
                    submitted_answer: answer.map(|a| a.answer.clone()),
                    correct_answer: q.correct_answer.clone(),
                    is_correct: answer.map(|a| a.is_correct).unwrap_or(false),
                }
            })
            .collect()
    }

    async fn owned_attempt(
        &self,
        attempt_id: Uuid,
        student_id: Uuid,
    ) -> Result<(QuizAttempt, Enrollment)> {
        let attempt = sqlx::query_as::<_, QuizAttempt>(
            r#"SELECT * FROM quiz_attempts WHERE id = $1"#,
        )
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Attempt not found".to_string()))?;

        let enrollment = self.enrollments.get_by_id(attempt.enrollment_id).await?;
        if enrollment.student_id != student_id {
            return Err(Error::Forbidden(
                "Attempt belongs to another student".to_string(),
            ));
        }

        Ok((attempt, enrollment))
    }

    async fn get_quiz(&self, quiz_id: Uuid) -> Result<Quiz> {
        sqlx::query_as::<_, Quiz>(r#"SELECT * FROM quizzes WHERE id = $1"#)
            .bind(quiz_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Quiz not found".to_string()))
    }

    /// Resolves the course a quiz belongs to, either directly or through the
    /// lesson that owns it.
    async fn quiz_with_course(&self, quiz_id: Uuid) -> Result<(Quiz, Uuid)> {
        let quiz = self.get_quiz(quiz_id).await?;

        let course_id = match (quiz.course_id, quiz.lesson_id) {
            (Some(course_id), _) => course_id,
            (None, Some(lesson_id)) => sqlx::query_scalar(
                r#"
                SELECT m.course_id
                FROM lessons l
                JOIN course_modules m ON m.id = l.module_id
                WHERE l.id = $1
                "#,
            )
            .bind(lesson_id)
            .fetch_one(&self.pool)
            .await?,
            (None, None) => {
                return Err(Error::Internal(
                    "Quiz has neither a course nor a lesson owner".to_string(),
                ))
            }
        };

        Ok((quiz, course_id))
    }
}

#[derive(Debug)]
pub struct AttemptOutcome {
    pub score: i32,
    pub total_questions: i32,
    pub passed: bool,
    pub review: Option<Vec<AnswerReview>>,
}
