pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::services::{
    certificate_service::CertificateService, enrollment_service::EnrollmentService,
    lesson_progress_service::LessonProgressService, quiz_service::QuizService,
};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub enrollment_service: EnrollmentService,
    pub lesson_progress_service: LessonProgressService,
    pub quiz_service: QuizService,
    pub certificate_service: CertificateService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let enrollment_service = EnrollmentService::new(pool.clone());
        let lesson_progress_service =
            LessonProgressService::new(pool.clone(), enrollment_service.clone());
        let quiz_service = QuizService::new(pool.clone(), enrollment_service.clone());
        let certificate_service = CertificateService::new(pool.clone());

        Self {
            pool,
            enrollment_service,
            lesson_progress_service,
            quiz_service,
            certificate_service,
        }
    }
}
