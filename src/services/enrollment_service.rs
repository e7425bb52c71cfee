use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::{get_config, GradePolicy};
use crate::error::{Error, Result};
use crate::models::course::Course;
use crate::models::enrollment::Enrollment;

#[derive(Clone)]
pub struct EnrollmentService {
    pool: PgPool,
}

impl EnrollmentService {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    /// Creates an enrollment with status 'enrolled' and progress 0. Duplicate
    /// enrollment is rejected; when two calls pass the pre-check together the
    /// (student_id, course_id) unique constraint still stops the second one.
    pub async fn enroll(&self, student_id: Uuid, course_id: Uuid) -> Result<Enrollment> {
        let course = sqlx::query_as::<_, Course>(r#"SELECT * FROM courses WHERE id = $1"#)
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await?;

        match course {
            Some(course) if course.is_active => {}
            _ => {
                return Err(Error::NotFound(
                    "Course not found or not open for enrollment".to_string(),
                ))
            }
        }

        let existing: Option<Uuid> = sqlx::query_scalar(
            r#"SELECT id FROM enrollments WHERE student_id = $1 AND course_id = $2"#,
        )
        .bind(student_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?;

        if existing.is_some() {
            return Err(Error::Conflict(
                "Student is already enrolled in this course".to_string(),
            ));
        }

        let enrollment = sqlx::query_as::<_, Enrollment>(
            r#"
            INSERT INTO enrollments (student_id, course_id)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(student_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::Conflict("Student is already enrolled in this course".to_string())
            }
            _ => Error::from(e),
        })?;

        tracing::info!(
            "Student {} enrolled in course {}",
            student_id,
            course_id
        );
        Ok(enrollment)
    }

    pub async fn get_by_id(&self, enrollment_id: Uuid) -> Result<Enrollment> {
        sqlx::query_as::<_, Enrollment>(r#"SELECT * FROM enrollments WHERE id = $1"#)
            .bind(enrollment_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Enrollment not found".to_string()))
    }

    pub async fn get_for_student(&self, student_id: Uuid, course_id: Uuid) -> Result<Enrollment> {
        sqlx::query_as::<_, Enrollment>(
            r#"SELECT * FROM enrollments WHERE student_id = $1 AND course_id = $2"#,
        )
        .bind(student_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Enrollment not found".to_string()))
    }

    pub async fn list_for_student(&self, student_id: Uuid) -> Result<Vec<Enrollment>> {
        let enrollments = sqlx::query_as::<_, Enrollment>(
            r#"SELECT * FROM enrollments WHERE student_id = $1 ORDER BY enrolled_at DESC"#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(enrollments)
    }

    /// Removes the enrollment and, through cascade, its lesson progress and
    /// quiz attempts. Certificates reference course/module ids weakly and
    /// survive.
    pub async fn withdraw(&self, student_id: Uuid, course_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            r#"DELETE FROM enrollments WHERE student_id = $1 AND course_id = $2"#,
        )
        .bind(student_id)
        .bind(course_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound("Enrollment not found".to_string()));
        }
        Ok(())
    }

    /// Promotes the enrollment to 'completed' once every lesson in the course
    /// is completed and every quiz attached to the course (directly or via a
    /// lesson) has a passed attempt. Safe to call after any progress event;
    /// returns the current row unchanged when the enrollment is not yet
    /// eligible. The guarded UPDATE keeps the transition one-directional
    /// under concurrent calls.
    pub async fn evaluate_course_completion(&self, enrollment_id: Uuid) -> Result<Enrollment> {
        let enrollment = self.get_by_id(enrollment_id).await?;
        if enrollment.status == "completed" {
            return Ok(enrollment);
        }

        let total_lessons: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM lessons l
            JOIN course_modules m ON m.id = l.module_id
            WHERE m.course_id = $1
            "#,
        )
        .bind(enrollment.course_id)
        .fetch_one(&self.pool)
        .await?;

        let completed_lessons: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM lesson_progress WHERE enrollment_id = $1 AND is_completed"#,
        )
        .bind(enrollment_id)
        .fetch_one(&self.pool)
        .await?;

        if completed_lessons < total_lessons {
            return Ok(enrollment);
        }

        let unpassed_quizzes: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM quizzes q
            LEFT JOIN lessons l ON l.id = q.lesson_id
            LEFT JOIN course_modules m ON m.id = l.module_id
            WHERE (q.course_id = $1 OR m.course_id = $1)
              AND NOT EXISTS (
                  SELECT 1 FROM quiz_attempts qa
                  WHERE qa.quiz_id = q.id
                    AND qa.enrollment_id = $2
                    AND qa.passed = TRUE
              )
            "#,
        )
        .bind(enrollment.course_id)
        .bind(enrollment_id)
        .fetch_one(&self.pool)
        .await?;

        if unpassed_quizzes > 0 {
            return Ok(enrollment);
        }

        let final_grade = self.compute_final_grade(enrollment_id).await?;

        let updated = sqlx::query_as::<_, Enrollment>(
            r#"
            UPDATE enrollments
            SET status = 'completed',
                progress = 100,
                completed_at = NOW(),
                final_grade = $2,
                updated_at = NOW()
            WHERE id = $1 AND status <> 'completed'
            RETURNING *
            "#,
        )
        .bind(enrollment_id)
        .bind(final_grade)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(completed) => {
                tracing::info!(
                    "Enrollment {} completed course {} with final grade {:?}",
                    completed.id,
                    completed.course_id,
                    completed.final_grade
                );
                Ok(completed)
            }
            // A concurrent call already completed it; the stored row wins.
            None => self.get_by_id(enrollment_id).await,
        }
    }

    /// Mean of per-quiz scores over completed attempts, one score per quiz
    /// selected by the configured policy. NULL when no attempt was ever
    /// completed (course without quizzes).
    async fn compute_final_grade(&self, enrollment_id: Uuid) -> Result<Option<Decimal>> {
        let grade: Option<Decimal> = match get_config().grade_policy {
            GradePolicy::Best => {
                sqlx::query_scalar(
                    r#"
                    SELECT AVG(best_score)::numeric
                    FROM (
                        SELECT MAX(score) AS best_score
                        FROM quiz_attempts
                        WHERE enrollment_id = $1 AND completed_at IS NOT NULL
                        GROUP BY quiz_id
                    ) per_quiz
                    "#,
                )
                .bind(enrollment_id)
                .fetch_one(&self.pool)
                .await?
            }
            GradePolicy::Latest => {
                sqlx::query_scalar(
                    r#"
                    SELECT AVG(score)::numeric
                    FROM (
                        SELECT DISTINCT ON (quiz_id) score
                        FROM quiz_attempts
                        WHERE enrollment_id = $1 AND completed_at IS NOT NULL
                        ORDER BY quiz_id, completed_at DESC
                    ) per_quiz
                    "#,
                )
                .bind(enrollment_id)
                .fetch_one(&self.pool)
                .await?
            }
        };
        Ok(grade.map(|g| g.round_dp(2)))
    }
}
