pub mod certificate_dto;
pub mod enrollment_dto;
pub mod progress_dto;
pub mod quiz_dto;
