pub mod certificate_routes;
pub mod enrollment_routes;
pub mod health;
pub mod progress_routes;
pub mod quiz_routes;
