pub mod certificate_service;
pub mod enrollment_service;
pub mod grading_service;
pub mod lesson_progress_service;
pub mod quiz_service;
