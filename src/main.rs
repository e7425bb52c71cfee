use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use learnhub_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    routes, AppState,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(pool);

    let public_api = Router::new()
        .route("/health", get(routes::health::health))
        .route(
            "/certificate/verify/:code",
            get(routes::certificate_routes::verify_certificate),
        )
        .layer(axum::middleware::from_fn_with_state(
            learnhub_backend::middleware::rate_limit::new_rps_state(config.public_rps),
            learnhub_backend::middleware::rate_limit::rps_middleware,
        ));

    let student_api = Router::new()
        .route(
            "/enrollments",
            get(routes::enrollment_routes::list_enrollments)
                .post(routes::enrollment_routes::enroll),
        )
        .route(
            "/enrollments/:course_id",
            get(routes::enrollment_routes::get_enrollment)
                .delete(routes::enrollment_routes::withdraw),
        )
        .route(
            "/lesson-progress/complete",
            post(routes::progress_routes::complete_lesson),
        )
        .route(
            "/lesson-progress/time",
            post(routes::progress_routes::record_time),
        )
        .route(
            "/quiz-attempts/start",
            post(routes::quiz_routes::start_attempt),
        )
        .route("/quiz-answer", post(routes::quiz_routes::submit_answer))
        .route(
            "/quiz-attempts/:id/complete",
            post(routes::quiz_routes::complete_attempt),
        )
        .route("/quiz-attempts/:id", get(routes::quiz_routes::get_attempt))
        .route(
            "/modulecertificate",
            post(routes::certificate_routes::issue_module_certificate),
        )
        .route(
            "/coursecertificate",
            post(routes::certificate_routes::issue_course_certificate),
        )
        .route(
            "/certificates",
            get(routes::certificate_routes::list_certificates),
        )
        .layer(axum::middleware::from_fn(
            learnhub_backend::middleware::auth::require_bearer_auth,
        ))
        .layer(axum::middleware::from_fn_with_state(
            learnhub_backend::middleware::rate_limit::new_rps_state(config.api_rps),
            learnhub_backend::middleware::rate_limit::rps_middleware,
        ));

    let app = public_api
        .merge(student_api)
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(1024 * 1024));

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
