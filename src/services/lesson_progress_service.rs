use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::course::Lesson;
use crate::models::enrollment::Enrollment;
use crate::models::lesson_progress::LessonProgress;
use crate::services::enrollment_service::EnrollmentService;

#[derive(Clone)]
pub struct LessonProgressService {
    pool: PgPool,
    enrollments: EnrollmentService,
}

impl LessonProgressService {
    pub fn new(pool: PgPool, enrollments: EnrollmentService) -> Self {
        Self { pool, enrollments }
    }

    /// Marks a lesson complete and recomputes the enrollment's progress from
    /// lesson counts. Idempotent: completing an already-completed lesson
    /// returns the stored record with its original completed_at. The
    /// enrollment row is locked for the whole transaction so concurrent
    /// completions recount against a consistent state and no update is lost.
    pub async fn mark_lesson_complete(
        &self,
        student_id: Uuid,
        enrollment_id: Uuid,
        lesson_id: Uuid,
    ) -> Result<LessonProgress> {
        let mut tx = self.pool.begin().await?;

        let enrollment = sqlx::query_as::<_, Enrollment>(
            r#"SELECT * FROM enrollments WHERE id = $1 FOR UPDATE"#,
        )
        .bind(enrollment_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound("Enrollment not found".to_string()))?;

        if enrollment.student_id != student_id {
            return Err(Error::Forbidden(
                "Enrollment belongs to another student".to_string(),
            ));
        }

        let (course_id, module_id) = self.lesson_context(&mut tx, lesson_id).await?;
        if course_id != enrollment.course_id {
            return Err(Error::BadRequest(
                "Lesson does not belong to the enrolled course".to_string(),
            ));
        }

        let progress_row = sqlx::query_as::<_, LessonProgress>(
            r#"
            INSERT INTO lesson_progress (enrollment_id, lesson_id, is_completed, completed_at)
            VALUES ($1, $2, TRUE, NOW())
            ON CONFLICT (enrollment_id, lesson_id) DO UPDATE
            SET is_completed = TRUE,
                completed_at = COALESCE(lesson_progress.completed_at, EXCLUDED.completed_at),
                updated_at = CASE
                    WHEN lesson_progress.is_completed THEN lesson_progress.updated_at
                    ELSE NOW()
                END
            RETURNING *
            "#,
        )
        .bind(enrollment_id)
        .bind(lesson_id)
        .fetch_one(&mut *tx)
        .await?;

        let total_lessons: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM lessons l
            JOIN course_modules m ON m.id = l.module_id
            WHERE m.course_id = $1
            "#,
        )
        .bind(enrollment.course_id)
        .fetch_one(&mut *tx)
        .await?;

        let completed_lessons: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM lesson_progress WHERE enrollment_id = $1 AND is_completed"#,
        )
        .bind(enrollment_id)
        .fetch_one(&mut *tx)
        .await?;

        // The completed lesson belongs to the course, so total is never zero.
        let progress =
            (((completed_lessons as f64 / total_lessons as f64) * 100.0).round() as i32).min(100);

        sqlx::query(
            r#"
            UPDATE enrollments
            SET progress = $2,
                current_module_id = $3,
                current_lesson_id = $4,
                status = CASE WHEN status = 'enrolled' THEN 'in_progress' ELSE status END,
                started_at = COALESCE(started_at, NOW()),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(enrollment_id)
        .bind(progress)
        .bind(module_id)
        .bind(lesson_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if progress >= 100 {
            self.enrollments
                .evaluate_course_completion(enrollment_id)
                .await?;
        }

        Ok(progress_row)
    }

    /// Adds a time delta to the lesson's progress row and to the enrollment
    /// total. Deltas are additive on purpose; callers must not resend totals.
    pub async fn record_time_spent(
        &self,
        student_id: Uuid,
        enrollment_id: Uuid,
        lesson_id: Uuid,
        delta_seconds: i32,
    ) -> Result<()> {
        let enrollment = self.enrollments.get_by_id(enrollment_id).await?;
        if enrollment.student_id != student_id {
            return Err(Error::Forbidden(
                "Enrollment belongs to another student".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let (course_id, _module_id) = self.lesson_context(&mut tx, lesson_id).await?;
        if course_id != enrollment.course_id {
            return Err(Error::BadRequest(
                "Lesson does not belong to the enrolled course".to_string(),
            ));
        }

        sqlx::query(
            r#"
            INSERT INTO lesson_progress (enrollment_id, lesson_id, time_spent_seconds)
            VALUES ($1, $2, $3)
            ON CONFLICT (enrollment_id, lesson_id) DO UPDATE
            SET time_spent_seconds = lesson_progress.time_spent_seconds + EXCLUDED.time_spent_seconds,
                updated_at = NOW()
            "#,
        )
        .bind(enrollment_id)
        .bind(lesson_id)
        .bind(delta_seconds)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE enrollments
            SET time_spent_seconds = time_spent_seconds + $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(enrollment_id)
        .bind(delta_seconds)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Resolves a lesson to its (course_id, module_id) pair.
    async fn lesson_context(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        lesson_id: Uuid,
    ) -> Result<(Uuid, Uuid)> {
        let lesson = sqlx::query_as::<_, Lesson>(r#"SELECT * FROM lessons WHERE id = $1"#)
            .bind(lesson_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| Error::NotFound("Lesson not found".to_string()))?;

        let course_id: Uuid = sqlx::query_scalar(
            r#"SELECT course_id FROM course_modules WHERE id = $1"#,
        )
        .bind(lesson.module_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok((course_id, lesson.module_id))
    }
}
