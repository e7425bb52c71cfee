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
    let public = Router::new()
        .route("/health", get(learnhub_backend::routes::health::health))
        .route(
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
            "/modulecertificate",
            post(learnhub_backend::routes::certificate_routes::issue_module_certificate),
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

async fn seed_course_with_lesson(pool: &sqlx::PgPool, title: &str) -> (Uuid, Uuid, Uuid) {
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

    (course_id, module_id, lesson_id)
}

#[tokio::test]
async fn certificate_issuance_and_verification() {
    init();
    let pool = learnhub_backend::database::pool::create_pool()
        .await
        .expect("pool");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");

    let (course1, module1, lesson1) = seed_course_with_lesson(&pool, "Finished Course").await;
    let (course2, module2, _lesson2) = seed_course_with_lesson(&pool, "Unfinished Course").await;
    let (_course3, module3, _lesson3) = seed_course_with_lesson(&pool, "Unenrolled Course").await;

    let student = Uuid::new_v4();
    let token = bearer_token(student);
    let app = app(learnhub_backend::AppState::new(pool.clone()));

    let (status, body) = request(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    // Finish course1: single lesson, no quiz.
    let (_, body) = request(
        &app,
        "POST",
        "/enrollments",
        Some(&token),
        Some(json!({ "courseId": course1 })),
    )
    .await;
    let enrollment1 = body["id"].as_str().unwrap().to_string();

    let (status, _) = request(
        &app,
        "POST",
        "/lesson-progress/complete",
        Some(&token),
        Some(json!({ "enrollmentId": enrollment1, "lessonId": lesson1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = request(
        &app,
        "GET",
        &format!("/enrollments/{}", course1),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["progress"], 100);
    // No quiz was ever attempted, so there is no grade to average.
    assert!(body["finalGrade"].is_null());

    // Enroll in course2 but leave its lesson untouched.
    let (_, _) = request(
        &app,
        "POST",
        "/enrollments",
        Some(&token),
        Some(json!({ "courseId": course2 })),
    )
    .await;

    let (status, body) = request(
        &app,
        "POST",
        "/modulecertificate",
        Some(&token),
        Some(json!({ "moduleId": module1, "grade": 95.5 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["moduleId"].as_str(), Some(module1.to_string().as_str()));
    assert_eq!(
        body["studentId"].as_str(),
        Some(student.to_string().as_str())
    );
    assert_eq!(body["grade"], json!("95.50"));
    let url = body["certificateUrl"].as_str().unwrap();
    assert!(url.contains(&module1.to_string()));
    assert!(url.contains(&student.to_string()));
    assert!(url.ends_with(".pdf"));

    let (status, _) = request(
        &app,
        "POST",
        "/modulecertificate",
        Some(&token),
        Some(json!({ "moduleId": module1, "grade": 95.5 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Unfinished module, unknown module, unenrolled module.
    let (status, _) = request(
        &app,
        "POST",
        "/modulecertificate",
        Some(&token),
        Some(json!({ "moduleId": module2, "grade": 80.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = request(
        &app,
        "POST",
        "/modulecertificate",
        Some(&token),
        Some(json!({ "moduleId": Uuid::new_v4(), "grade": 80.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = request(
        &app,
        "POST",
        "/modulecertificate",
        Some(&token),
        Some(json!({ "moduleId": module3, "grade": 80.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Course certificate requires a completed enrollment.
    let (status, _) = request(
        &app,
        "POST",
        "/coursecertificate",
        Some(&token),
        Some(json!({ "courseId": course2 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = request(
        &app,
        "POST",
        "/coursecertificate",
        Some(&token),
        Some(json!({ "courseId": course1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["isValid"], json!(true));
    assert_eq!(body["userId"].as_str(), Some(student.to_string().as_str()));
    let code = body["verificationCode"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 19);
    assert!(!body["digitalSignature"].as_str().unwrap().is_empty());

    // Reissue is off by default.
    let (status, _) = request(
        &app,
        "POST",
        "/coursecertificate",
        Some(&token),
        Some(json!({ "courseId": course1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = request(&app, "GET", "/certificates", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(|a| a.len()), Some(1));

    // Verification is public.
    let (status, body) = request(
        &app,
        "GET",
        &format!("/certificate/verify/{}", code),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isValid"], json!(true));
    assert_eq!(
        body["certificate"]["verificationCode"].as_str(),
        Some(code.as_str())
    );

    let (status, body) = request(
        &app,
        "GET",
        "/certificate/verify/NOPE-NOPE-NOPE-NOPE",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isValid"], json!(false));
    assert!(body.get("certificate").is_none());

    // A tampered row no longer matches its signature.
    sqlx::query(r#"UPDATE certificates SET user_id = $1 WHERE verification_code = $2"#)
        .bind(Uuid::new_v4())
        .bind(&code)
        .execute(&pool)
        .await
        .expect("tamper");

    let (status, body) = request(
        &app,
        "GET",
        &format!("/certificate/verify/{}", code),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isValid"], json!(false));

    let (_, body) = request(
        &app,
        "GET",
        &format!("/enrollments/{}", course1),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["certificateIssued"], json!(true));
}
