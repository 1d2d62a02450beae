//! Integration tests for examhub-api endpoints
//!
//! Each test builds the full router over an in-memory database, a blob
//! store in a temporary directory and the in-process identity gateway.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    routing::get,
    Router,
};
use examhub_api::identity::LocalIdentityGateway;
use examhub_api::storage::LocalBlobStore;
use examhub_api::{build_router, with_request_timeout, AppState};
use examhub_common::db::init_memory_database;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

const BOUNDARY: &str = "examhub-test-boundary";

/// Test helper: app plus the temp dir that must outlive it
async fn setup_app() -> (Router, TempDir) {
    let db = init_memory_database()
        .await
        .expect("Should open in-memory database");
    let dir = TempDir::new().expect("Should create temp dir");
    let blobs = Arc::new(LocalBlobStore::new(
        dir.path().to_path_buf(),
        "http://localhost:5000/files",
    ));
    let state = AppState::new(
        db,
        blobs,
        Arc::new(LocalIdentityGateway::new()),
        Some(dir.path().to_path_buf()),
    );
    (build_router(state), dir)
}

fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
}

fn multipart_request(method: &str, uri: &str, parts: &[Part]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, file_name, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method(method)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, extract_json(response.into_body()).await)
}

/// School with one program and one semester; returns the semester route prefix
/// and the semester id
async fn seed_semester(app: &Router) -> (String, String) {
    let (status, school) = send(app, json_request("POST", "/api/schools", json!({"name": "Engineering"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let school_id = school["_id"].as_str().unwrap().to_string();

    let (status, program) = send(
        app,
        json_request(
            "POST",
            &format!("/api/schools/{}/programs", school_id),
            json!({"name": "Computer Science"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let program_id = program["_id"].as_str().unwrap().to_string();

    let (status, semester) = send(
        app,
        json_request(
            "POST",
            &format!("/api/schools/{}/programs/{}/semesters", school_id, program_id),
            json!({"name": "Fall"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let semester_id = semester["_id"].as_str().unwrap().to_string();

    (
        format!(
            "/api/schools/{}/programs/{}/semesters/{}",
            school_id, program_id, semester_id
        ),
        semester_id,
    )
}

async fn create_account(app: &Router, collection: &str, email: &str) -> Value {
    let (status, account) = send(
        app,
        json_request(
            "POST",
            &format!("/api/{}", collection),
            json!({"email": email, "password": "secret123"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", account);
    account
}

// =============================================================================
// Service surface
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _dir) = setup_app().await;

    let (status, body) = send(&app, test_request("GET", "/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["module"], "examhub-api");
    assert_eq!(body["database"], "connected");
    assert!(body["version"].is_string());
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_banner() {
    let (app, _dir) = setup_app().await;

    let response = app.oneshot(test_request("GET", "/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"Online Exam Monitoring API Running...");
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let (app, _dir) = setup_app().await;

    let (status, body) = send(&app, test_request("GET", "/api/nope")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Route not found");
}

#[tokio::test]
async fn test_malformed_path_id_is_json_400() {
    let (app, _dir) = setup_app().await;

    let (status, body) = send(&app, test_request("GET", "/api/exams/not-a-uuid")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_malformed_json_body_is_json_400() {
    let (app, _dir) = setup_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/schools")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_request_timeout_is_json_408() {
    let slow = Router::new().route(
        "/slow",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "done"
        }),
    );
    let app = with_request_timeout(slow, Duration::from_millis(20));

    let (status, body) = send(&app, test_request("GET", "/slow")).await;

    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(body["error"], "Request timed out");
}

// =============================================================================
// Schools
// =============================================================================

#[tokio::test]
async fn test_school_listing_and_conflicts() {
    let (app, _dir) = setup_app().await;

    let (status, body) = send(&app, test_request("GET", "/api/schools")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "No schools found");

    let (status, _) = send(&app, json_request("POST", "/api/schools", json!({"name": "Arts"}))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, json_request("POST", "/api/schools", json!({"name": "Arts"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "School with this name already exists");

    let (status, body) = send(&app, json_request("POST", "/api/schools", json!({"name": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = send(&app, test_request("GET", "/api/schools")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_semester_enrollment_expands_students() {
    let (app, _dir) = setup_app().await;
    let (semester, _) = seed_semester(&app).await;
    let student = create_account(&app, "students", "ada@example.com").await;

    let (status, view) = send(
        &app,
        json_request(
            "POST",
            &format!("{}/students", semester),
            json!({"email": "ADA@example.com"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", view);
    assert_eq!(view["students"][0]["email"], "ada@example.com");
    assert_eq!(view["students"][0]["_id"], student["_id"]);

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("{}/students", semester),
            json!({"email": "nobody@example.com"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{}", body);

    let (status, view) = send(
        &app,
        test_request("DELETE", &format!("{}/students/ada@example.com", semester)),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", view);
    assert_eq!(view["students"], json!([]));
}

// =============================================================================
// Accounts
// =============================================================================

#[tokio::test]
async fn test_account_roles_and_duplicates() {
    let (app, _dir) = setup_app().await;
    let student = create_account(&app, "students", "grace@example.com").await;
    let staff = create_account(&app, "staff", "alan@example.com").await;

    let (status, body) = send(
        &app,
        json_request("POST", "/api/auth/get-role", json!({"uid": student["uid"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "student");

    let (_, body) = send(
        &app,
        json_request("POST", "/api/auth/get-role", json!({"uid": staff["uid"]})),
    )
    .await;
    assert_eq!(body["role"], "staff");

    let (status, _) = send(
        &app,
        json_request("POST", "/api/auth/get-role", json!({"uid": "unknown"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/students",
            json!({"email": "Grace@Example.com ", "password": "secret123"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);

    let (status, _) = send(&app, test_request("DELETE", "/api/students/grace@example.com")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, test_request("DELETE", "/api/students/grace@example.com")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bulk_students_reports_per_entry_errors() {
    let (app, _dir) = setup_app().await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/students/bulk",
            json!([
                {"email": "one@example.com", "password": "secret123"},
                {"email": "two@example.com", "password": "123"},
            ]),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["created"].as_array().unwrap().len(), 1);
    assert_eq!(body["errors"].as_array().unwrap().len(), 1);
    assert_eq!(body["errors"][0]["email"], "two@example.com");
}

// =============================================================================
// Exams and attempts
// =============================================================================

const QUESTIONS: &str = r#"[
    {"description": "Pick one", "type": "mcq", "options": ["a", "b"]},
    {"description": "Upload your working", "type": "file"}
]"#;

#[tokio::test]
async fn test_exam_lifecycle_over_semester() {
    let (app, _dir) = setup_app().await;
    let (semester, semester_id) = seed_semester(&app).await;
    let student = create_account(&app, "students", "ada@example.com").await;
    let staff = create_account(&app, "staff", "alan@example.com").await;
    let uid = student["uid"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        json_request("POST", &format!("{}/students", semester), json!({"email": "ada@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, exam) = send(
        &app,
        multipart_request(
            "POST",
            "/api/exams",
            &[
                Part::Text("title", "Midterm"),
                Part::Text("class", &semester_id),
                Part::Text("startDate", "2020-03-01T09:00"),
                Part::Text("endDate", "2020-03-01T11:00"),
                Part::Text("duration", "90"),
                Part::Text("questions", QUESTIONS),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", exam);
    let exam_id = exam["_id"].as_str().unwrap().to_string();
    let file_question = exam["questions"][1]["_id"].as_str().unwrap().to_string();
    assert_eq!(exam["owner"]["kind"], "semester");

    // Enrolled student and every staff member now reference the exam
    let (_, students) = send(&app, test_request("GET", "/api/students")).await;
    assert_eq!(students[0]["exams"][0], exam_id.as_str());
    let (status, staff_exams) = send(
        &app,
        test_request("GET", &format!("/api/staff/{}/exams", staff["uid"].as_str().unwrap())),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(staff_exams[0]["_id"], exam_id.as_str());
    assert_eq!(staff_exams[0]["isExamOver"], true);

    // Answer file upload
    let (status, body) = send(
        &app,
        multipart_request(
            "POST",
            "/api/exams/upload-file",
            &[
                Part::Text("examId", &exam_id),
                Part::Text("questionId", &file_question),
                Part::Text("uid", &uid),
                Part::File {
                    name: "file",
                    file_name: "working.pdf",
                    content_type: "application/pdf",
                    bytes: b"%PDF-1.4 working",
                },
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["fileUrl"].as_str().unwrap().starts_with("http://localhost:5000/files/"));

    let (_, submissions) = send(
        &app,
        test_request("GET", &format!("/api/exams/{}/submissions/{}", exam_id, uid)),
    )
    .await;
    assert_eq!(submissions.as_array().unwrap().len(), 1);

    // Saved answers
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            &format!("/api/exams/{}/answers", exam_id),
            json!({"uid": uid, "userAnswers": {"q1": "a"}, "uploadedFileUrls": {}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["message"], "Answers saved successfully");

    let (_, body) = send(
        &app,
        test_request("GET", &format!("/api/exams/{}/answers/{}", exam_id, uid)),
    )
    .await;
    assert_eq!(body["userAnswers"]["q1"], "a");

    // Attendance before any report
    let (status, roster) = send(&app, test_request("GET", &format!("/api/exams/{}/students", exam_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(roster[0]["attended"], false);

    // Submissions archive
    let response = app
        .clone()
        .oneshot(test_request(
            "GET",
            &format!("/api/exams/{}/download/submissions", exam_id),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.contains("Midterm_submissions.zip"));
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..2], b"PK");

    // No reports yet
    let (status, _) = send(
        &app,
        test_request("GET", &format!("/api/exams/{}/download/reports", exam_id)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Delete removes the exam from every back-reference
    let (status, _) = send(&app, test_request("DELETE", &format!("/api/exams/{}", exam_id))).await;
    assert_eq!(status, StatusCode::OK);
    let (_, students) = send(&app, test_request("GET", "/api/students")).await;
    assert_eq!(students[0]["exams"], json!([]));
    let (status, _) = send(&app, test_request("GET", &format!("/api/exams/{}", exam_id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_exam_with_unknown_owner_is_rejected() {
    let (app, _dir) = setup_app().await;

    let (status, body) = send(
        &app,
        multipart_request(
            "POST",
            "/api/exams",
            &[
                Part::Text("title", "Orphan"),
                Part::Text("class", "6f1c1f55-2b4e-4a51-9d83-0b1e1b0b8a11"),
                Part::Text("startDate", "2025-03-01T09:00"),
                Part::Text("endDate", "2025-03-01T11:00"),
                Part::Text("duration", "60"),
                Part::Text("questions", QUESTIONS),
            ],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND, "{}", body);
    let (_, exams) = send(&app, test_request("GET", "/api/exams")).await;
    assert_eq!(exams, json!([]));
}

#[tokio::test]
async fn test_report_progress_then_upload() {
    let (app, _dir) = setup_app().await;
    let class = send(&app, json_request("POST", "/api/classes", json!({"name": "Evening"}))).await.1;
    let class_id = class["_id"].as_str().unwrap().to_string();
    let student = create_account(&app, "students", "ada@example.com").await;
    let uid = student["uid"].as_str().unwrap().to_string();
    send(
        &app,
        json_request("POST", &format!("/api/classes/{}/students", class_id), json!({"email": "ada@example.com"})),
    )
    .await;

    let (status, exam) = send(
        &app,
        multipart_request(
            "POST",
            "/api/exams",
            &[
                Part::Text("title", "Quiz"),
                Part::Text("class", &class_id),
                Part::Text("ownerKind", "class"),
                Part::Text("startDate", "2025-03-01T09:00"),
                Part::Text("endDate", "2025-03-01T10:00"),
                Part::Text("duration", "30"),
                Part::Text("questions", QUESTIONS),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", exam);
    let exam_id = exam["_id"].as_str().unwrap().to_string();

    let (status, report) = send(
        &app,
        json_request(
            "POST",
            &format!("/api/exams/{}/report/progress", exam_id),
            json!({"uid": uid, "violations": {"tabSwitched": 2}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", report);
    assert_eq!(report["completed"], false);

    let (status, body) = send(
        &app,
        multipart_request(
            "POST",
            &format!("/api/exams/{}/report/upload", exam_id),
            &[
                Part::Text("uid", &uid),
                Part::Text("violations", r#"{"tabSwitched": 3, "noFaceDetected": 1}"#),
                Part::File {
                    name: "reportFile",
                    file_name: "report.pdf",
                    content_type: "application/pdf",
                    bytes: b"%PDF-1.4 report",
                },
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["reportUrl"].is_string());

    let (_, report) = send(
        &app,
        test_request("GET", &format!("/api/exams/{}/report/{}", exam_id, uid)),
    )
    .await;
    assert_eq!(report["completed"], true);
    assert_eq!(report["totalViolations"], 4);

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            &format!("/api/exams/{}/report/progress", exam_id),
            json!({"uid": uid}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, roster) = send(&app, test_request("GET", &format!("/api/exams/{}/students", exam_id))).await;
    assert_eq!(roster[0]["attended"], true);
}
