use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::get_config;
use crate::error::{Error, Result};
use crate::models::certificate::Certificate;
use crate::models::course::CourseModule;
use crate::models::enrollment::Enrollment;
use crate::models::module_certificate::ModuleCertificate;
use crate::utils::signature::{sign_certificate, verify_signature};
use crate::utils::token::generate_verification_code;

const CODE_GROUPS: usize = 4;
const CODE_GROUP_LEN: usize = 4;

#[derive(Clone)]
pub struct CertificateService {
    pool: PgPool,
}

impl CertificateService {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    /// Issues a module certificate once per (module, student). The unique
    /// constraint closes the check-then-create race, so concurrent requests
    /// get exactly one 201 and the rest a Conflict.
    pub async fn issue_module_certificate(
        &self,
        student_id: Uuid,
        module_id: Uuid,
        grade: f64,
    ) -> Result<ModuleCertificate> {
        let module = sqlx::query_as::<_, CourseModule>(
            r#"SELECT * FROM course_modules WHERE id = $1"#,
        )
        .bind(module_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Module not found".to_string()))?;

        let enrollment = sqlx::query_as::<_, Enrollment>(
            r#"SELECT * FROM enrollments WHERE student_id = $1 AND course_id = $2"#,
        )
        .bind(student_id)
        .bind(module.course_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            Error::NotFound("Student is not enrolled in the module's course".to_string())
        })?;

        let incomplete_lessons: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM lessons l
            WHERE l.module_id = $1
              AND NOT EXISTS (
                  SELECT 1 FROM lesson_progress lp
                  WHERE lp.lesson_id = l.id
                    AND lp.enrollment_id = $2
                    AND lp.is_completed
              )
            "#,
        )
        .bind(module_id)
        .bind(enrollment.id)
        .fetch_one(&self.pool)
        .await?;

        if incomplete_lessons > 0 {
            return Err(Error::Conflict(
                "Module is not complete yet".to_string(),
            ));
        }

        let config = get_config();
        let certificate_url = format!(
            "{}/modules/{}/{}.pdf",
            config.certificate_base_url, module_id, student_id
        );
        let grade = Decimal::from_f64(grade).unwrap_or_default().round_dp(2);

        let certificate = sqlx::query_as::<_, ModuleCertificate>(
            r#"
            INSERT INTO module_certificates (module_id, student_id, certificate_url, grade)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(module_id)
        .bind(student_id)
        .bind(&certificate_url)
        .bind(grade)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => Error::Conflict(
                "Module certificate already issued for this module".to_string(),
            ),
            _ => Error::from(e),
        })?;

        tracing::info!(
            "Issued module certificate {} to student {} for module {}",
            certificate.id,
            student_id,
            module_id
        );
        Ok(certificate)
    }

    /// Issues a course certificate for a completed enrollment. Duplicate
    /// issuance either fails with Conflict or, when reissue is enabled,
    /// revokes the prior certificate and issues a fresh one atomically. The
    /// verification code is retried with a fresh transaction on the rare
    /// collision, since Postgres aborts a transaction after a unique
    /// violation.
    pub async fn issue_course_certificate(
        &self,
        student_id: Uuid,
        course_id: Uuid,
    ) -> Result<Certificate> {
        let config = get_config();

        let enrollment = sqlx::query_as::<_, Enrollment>(
            r#"SELECT * FROM enrollments WHERE student_id = $1 AND course_id = $2"#,
        )
        .bind(student_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Enrollment not found".to_string()))?;

        if enrollment.status != "completed" {
            return Err(Error::Conflict("Course is not completed yet".to_string()));
        }

        let has_valid: Option<Uuid> = sqlx::query_scalar(
            r#"SELECT id FROM certificates WHERE course_id = $1 AND user_id = $2 AND is_valid"#,
        )
        .bind(course_id)
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        if has_valid.is_some() && !config.allow_certificate_reissue {
            return Err(Error::Conflict(
                "Certificate already issued for this course".to_string(),
            ));
        }

        for _ in 0..3 {
            let mut tx = self.pool.begin().await?;

            if has_valid.is_some() {
                sqlx::query(
                    r#"
                    UPDATE certificates SET is_valid = FALSE
                    WHERE course_id = $1 AND user_id = $2 AND is_valid
                    "#,
                )
                .bind(course_id)
                .bind(student_id)
                .execute(&mut *tx)
                .await?;
                tracing::warn!(
                    "Revoked prior certificate for course {} student {} before reissue",
                    course_id,
                    student_id
                );
            }

            let id = Uuid::new_v4();
            let code = generate_verification_code(CODE_GROUPS, CODE_GROUP_LEN);
            let signature = sign_certificate(
                &config.certificate_signing_secret,
                id,
                course_id,
                student_id,
                &code,
            );

            let inserted = sqlx::query_as::<_, Certificate>(
                r#"
                INSERT INTO certificates (id, course_id, user_id, verification_code, digital_signature)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(course_id)
            .bind(student_id)
            .bind(&code)
            .bind(&signature)
            .fetch_one(&mut *tx)
            .await;

            let certificate = match inserted {
                Ok(certificate) => certificate,
                Err(sqlx::Error::Database(db))
                    if db.is_unique_violation()
                        && db.constraint() == Some("certificates_verification_code_key") =>
                {
                    // Code collision; abandon the aborted transaction and retry.
                    continue;
                }
                Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                    return Err(Error::Conflict(
                        "Certificate already issued for this course".to_string(),
                    ));
                }
                Err(e) => return Err(e.into()),
            };

            sqlx::query(
                r#"UPDATE enrollments SET certificate_issued = TRUE, updated_at = NOW() WHERE id = $1"#,
            )
            .bind(enrollment.id)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;

            tracing::info!(
                "Issued certificate {} for course {} to student {}",
                certificate.verification_code,
                course_id,
                student_id
            );
            return Ok(certificate);
        }

        Err(Error::Internal(
            "Could not generate a unique verification code".to_string(),
        ))
    }

    /// Public lookup by verification code. Unknown codes, revoked rows, and
    /// signature mismatches all come back as not valid with no payload.
    pub async fn verify_certificate(&self, code: &str) -> Result<(bool, Option<Certificate>)> {
        let found = sqlx::query_as::<_, Certificate>(
            r#"SELECT * FROM certificates WHERE verification_code = $1"#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        let certificate = match found {
            Some(c) if c.is_valid => c,
            _ => return Ok((false, None)),
        };

        let config = get_config();
        let signature_ok = verify_signature(
            &config.certificate_signing_secret,
            certificate.id,
            certificate.course_id,
            certificate.user_id,
            &certificate.verification_code,
            &certificate.digital_signature,
        );

        if !signature_ok {
            tracing::warn!(
                "Certificate {} failed signature verification",
                certificate.id
            );
            return Ok((false, None));
        }

        Ok((true, Some(certificate)))
    }

    pub async fn list_for_student(&self, student_id: Uuid) -> Result<Vec<Certificate>> {
        let certificates = sqlx::query_as::<_, Certificate>(
            r#"
            SELECT * FROM certificates
            WHERE user_id = $1 AND is_valid
            ORDER BY issued_at DESC
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(certificates)
    }
}
