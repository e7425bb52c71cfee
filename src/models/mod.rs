pub mod certificate;
pub mod course;
pub mod enrollment;
pub mod lesson_progress;
pub mod module_certificate;
pub mod quiz;
pub mod quiz_answer;
pub mod quiz_attempt;
