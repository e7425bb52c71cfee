use std::env;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use uuid::Uuid;

use learnhub_backend::middleware::auth::Claims;

fn init() {
    dotenvy::dotenv().ok();
    env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
    env::set_var("JWT_SECRET", "test_secret_key");
    env::set_var("CERTIFICATE_SIGNING_SECRET", "cert_signing_secret");
    env::set_var("CERTIFICATE_BASE_URL", "https://certs.example.com");
    env::set_var("ALLOW_CERTIFICATE_REISSUE", "true");
    env::set_var("PUBLIC_RPS", "1000");
    env::set_var("API_RPS", "1000");
    let _ = learnhub_backend::config::init_config();
}

fn bearer_token(student_id: Uuid) -> String {
    let claims = Claims {
        sub: student_id.to_string(),
        exp: 4102444800,
        username: Some("student".to_string()),
        role: Some("student".to_string()),
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret("test_secret_key".as_bytes()),
    )
    .expect("token")
}

fn app(state: learnhub_backend::AppState) -> Router {
    let public = Router::new().route(
        "/certificate/verify/:code",
        get(learnhub_backend::routes::certificate_routes::verify_certificate),
    );
    let protected = Router::new()
        .route(
            "/enrollments",
            post(learnhub_backend::routes::enrollment_routes::enroll),
        )
        .route(
            "/enrollments/:course_id",
            get(learnhub_backend::routes::enrollment_routes::get_enrollment),
        )
        .route(
            "/lesson-progress/complete",
            post(learnhub_backend::routes::progress_routes::complete_lesson),
        )
        .route(
            "/coursecertificate",
            post(learnhub_backend::routes::certificate_routes::issue_course_certificate),
        )
        .route(
            "/certificates",
            get(learnhub_backend::routes::certificate_routes::list_certificates),
        )
        .layer(axum::middleware::from_fn(
            learnhub_backend::middleware::auth::require_bearer_auth,
        ));
    public.merge(protected).with_state(state)
}

async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let req = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let body = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
    };
    (status, body)
}

async fn seed_course_with_lesson(pool: &sqlx::PgPool, title: &str) -> (Uuid, Uuid) {
    let course_id = Uuid::new_v4();
    sqlx::query(r#"INSERT INTO courses (id, title) VALUES ($1, $2)"#)
        .bind(course_id)
        .bind(title)
        .execute(pool)
        .await
        .expect("seed course");

    let module_id = Uuid::new_v4();
    sqlx::query(
        r#"INSERT INTO course_modules (id, course_id, title, order_index) VALUES ($1, $2, 'Module 1', 1)"#,
    )
    .bind(module_id)
    .bind(course_id)
    .execute(pool)
    .await
    .expect("seed module");

    let lesson_id = Uuid::new_v4();
    sqlx::query(
        r#"INSERT INTO lessons (id, module_id, title, order_index) VALUES ($1, $2, 'Lesson 1', 1)"#,
    )
    .bind(lesson_id)
    .bind(module_id)
    .execute(pool)
    .await
    .expect("seed lesson");

    (course_id, lesson_id)
}

#[tokio::test]
async fn reissue_revokes_prior_certificate() {
    init();
    let pool = learnhub_backend::database::pool::create_pool()
        .await
        .expect("pool");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");

    let (course_id, lesson_id) = seed_course_with_lesson(&pool, "Reissue Course").await;

    let student = Uuid::new_v4();
    let token = bearer_token(student);
    let app = app(learnhub_backend::AppState::new(pool.clone()));

    let (status, body) = request(
        &app,
        "POST",
        "/enrollments",
        Some(&token),
        Some(json!({ "courseId": course_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let enrollment_id = body["id"].as_str().unwrap().to_string();

    let (status, _) = request(
        &app,
        "POST",
        "/lesson-progress/complete",
        Some(&token),
        Some(json!({ "enrollmentId": enrollment_id, "lessonId": lesson_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = request(
        &app,
        "POST",
        "/coursecertificate",
        Some(&token),
        Some(json!({ "courseId": course_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let first_code = body["verificationCode"].as_str().unwrap().to_string();

    // A second issuance succeeds and the earlier certificate is revoked.
    let (status, body) = request(
        &app,
        "POST",
        "/coursecertificate",
        Some(&token),
        Some(json!({ "courseId": course_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["isValid"], json!(true));
    let second_code = body["verificationCode"].as_str().unwrap().to_string();
    assert_ne!(second_code, first_code);

    let (status, body) = request(
        &app,
        "GET",
        &format!("/certificate/verify/{}", first_code),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isValid"], json!(false));
    assert!(body.get("certificate").is_none());

    let (status, body) = request(
        &app,
        "GET",
        &format!("/certificate/verify/{}", second_code),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isValid"], json!(true));
    assert_eq!(body["certificate"]["verificationCode"], json!(second_code));

    // The listing only ever shows the current certificate.
    let (status, body) = request(&app, "GET", "/certificates", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let listed = body.as_array().expect("certificate list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["verificationCode"], json!(second_code));

    // Both rows remain in history but only one is valid.
    let total: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM certificates WHERE course_id = $1 AND user_id = $2"#,
    )
    .bind(course_id)
    .bind(student)
    .fetch_one(&pool)
    .await
    .expect("count certificates");
    assert_eq!(total, 2);

    let valid: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM certificates WHERE course_id = $1 AND user_id = $2 AND is_valid"#,
    )
    .bind(course_id)
    .bind(student)
    .fetch_one(&pool)
    .await
    .expect("count valid certificates");
    assert_eq!(valid, 1);

    let (_, body) = request(
        &app,
        "GET",
        &format!("/enrollments/{}", course_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["certificateIssued"], json!(true));
}
