//! Exam attempt endpoints: answer files, reports, saved answers, downloads

use axum::{
    extract::{Multipart, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use examhub_common::db::models::{ExamReport, SavedAnswer, Snapshot, Submission, Violations};
use examhub_common::db::reports;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::multipart::Form;
use crate::error::{ApiError, ApiResult, JsonBody, PathParams};
use crate::services::downloads::{self, Download};
use crate::services::reports::ReportDetails;
use crate::services::submissions::{self, Attendance};
use crate::services::{answers, reports as report_service};
use crate::AppState;

fn uuid_field(form: &Form, name: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(form.required(name)?)
        .map_err(|_| ApiError::validation(format!("Invalid {}", name)))
}

/// POST /api/exams/upload-file (multipart: file, examId, questionId, uid)
pub async fn upload_file(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Json<Value>> {
    let mut form = Form::read(multipart).await?;
    let exam_id = uuid_field(&form, "examId")?;
    let question_id = uuid_field(&form, "questionId")?;
    let uid = form.required("uid")?.to_string();
    let file = form
        .take_file("file")
        .ok_or_else(|| ApiError::validation("No file uploaded"))?;

    let submission = submissions::upload_submission(
        &state.db,
        state.blobs.as_ref(),
        exam_id,
        question_id,
        &uid,
        file,
    )
    .await?;
    Ok(Json(json!({ "fileUrl": submission.file_url })))
}

/// GET /api/exams/:exam_id/submissions/:uid
pub async fn student_submissions(
    State(state): State<AppState>,
    PathParams((exam_id, uid)): PathParams<(Uuid, String)>,
) -> ApiResult<Json<Vec<Submission>>> {
    Ok(Json(submissions::for_student(&state.db, exam_id, &uid).await?))
}

/// GET /api/exams/:exam_id/students
pub async fn exam_students(
    State(state): State<AppState>,
    PathParams(exam_id): PathParams<Uuid>,
) -> ApiResult<Json<Vec<Attendance>>> {
    Ok(Json(submissions::attendance(&state.db, exam_id).await?))
}

/// POST /api/exams/:exam_id/report/upload (multipart)
pub async fn upload_report(
    State(state): State<AppState>,
    PathParams(exam_id): PathParams<Uuid>,
    multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let mut form = Form::read(multipart).await?;
    let details = ReportDetails {
        uid: form.required("uid")?.to_string(),
        violations: form
            .json::<Violations>("violations", "Invalid violations format")?
            .unwrap_or_default(),
        exam_start_time: form.optional_timestamp("examStartTime")?,
        exam_end_time: form.optional_timestamp("examEndTime")?,
        word_counts: form
            .json::<Snapshot>("wordCounts", "Invalid wordCounts format")?
            .unwrap_or_default(),
        user_answers: form
            .json::<Snapshot>("userAnswers", "Invalid userAnswers format")?
            .unwrap_or_default(),
    };
    let file = form
        .take_file("reportFile")
        .ok_or_else(|| ApiError::validation("No report file uploaded"))?;

    let report =
        report_service::upload_report(&state.db, state.blobs.as_ref(), exam_id, details, file).await?;
    Ok(Json(json!({ "reportUrl": report.report_url })))
}

/// POST /api/exams/:exam_id/report/progress
pub async fn report_progress(
    State(state): State<AppState>,
    PathParams(exam_id): PathParams<Uuid>,
    JsonBody(details): JsonBody<ReportDetails>,
) -> ApiResult<Json<ExamReport>> {
    if details.uid.trim().is_empty() {
        return Err(ApiError::validation("uid is required"));
    }
    Ok(Json(report_service::record_progress(&state.db, exam_id, details).await?))
}

/// GET /api/exams/:exam_id/report/:uid
pub async fn get_report(
    State(state): State<AppState>,
    PathParams((exam_id, uid)): PathParams<(Uuid, String)>,
) -> ApiResult<Json<ExamReport>> {
    Ok(Json(report_service::get_report(&state.db, exam_id, &uid).await?))
}

/// GET /api/exams/:exam_id/reports
pub async fn list_reports(
    State(state): State<AppState>,
    PathParams(exam_id): PathParams<Uuid>,
) -> ApiResult<Json<Vec<ExamReport>>> {
    Ok(Json(reports::for_exam(&state.db, exam_id).await?))
}

fn zip_response(download: Download) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", download.file_name),
            ),
        ],
        download.body,
    )
        .into_response()
}

/// GET /api/exams/:exam_id/download/submissions
pub async fn download_submissions(
    State(state): State<AppState>,
    PathParams(exam_id): PathParams<Uuid>,
) -> ApiResult<Response> {
    let download = downloads::submissions_archive(&state.db, state.blobs.clone(), exam_id).await?;
    Ok(zip_response(download))
}

/// GET /api/exams/:exam_id/download/reports
pub async fn download_reports(
    State(state): State<AppState>,
    PathParams(exam_id): PathParams<Uuid>,
) -> ApiResult<Response> {
    let download = downloads::reports_archive(&state.db, state.blobs.clone(), exam_id).await?;
    Ok(zip_response(download))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAnswersBody {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub user_answers: Snapshot,
    #[serde(default)]
    pub uploaded_file_urls: Snapshot,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedAnswersResponse {
    pub user_answers: Snapshot,
    pub uploaded_file_urls: Snapshot,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAnswersResponse {
    pub message: &'static str,
    pub saved_answer: SavedAnswer,
}

/// POST /api/exams/:exam_id/answers
pub async fn save_answers(
    State(state): State<AppState>,
    PathParams(exam_id): PathParams<Uuid>,
    JsonBody(body): JsonBody<SaveAnswersBody>,
) -> ApiResult<Json<SaveAnswersResponse>> {
    let saved_answer = answers::save_answers(
        &state.db,
        exam_id,
        &body.uid,
        body.user_answers,
        body.uploaded_file_urls,
    )
    .await?;

    Ok(Json(SaveAnswersResponse {
        message: "Answers saved successfully",
        saved_answer,
    }))
}

/// GET /api/exams/:exam_id/answers/:uid
pub async fn saved_answers(
    State(state): State<AppState>,
    PathParams((exam_id, uid)): PathParams<(Uuid, String)>,
) -> ApiResult<Json<SavedAnswersResponse>> {
    let (user_answers, uploaded_file_urls) = answers::saved_answers(&state.db, exam_id, &uid).await?;
    Ok(Json(SavedAnswersResponse {
        user_answers,
        uploaded_file_urls,
    }))
}

pub fn attempt_routes() -> Router<AppState> {
    Router::new()
        .route("/api/exams/upload-file", post(upload_file))
        .route("/api/exams/:exam_id/submissions/:uid", get(student_submissions))
        .route("/api/exams/:exam_id/students", get(exam_students))
        .route("/api/exams/:exam_id/report/upload", post(upload_report))
        .route("/api/exams/:exam_id/report/progress", post(report_progress))
        .route("/api/exams/:exam_id/report/:uid", get(get_report))
        .route("/api/exams/:exam_id/reports", get(list_reports))
        .route("/api/exams/:exam_id/download/submissions", get(download_submissions))
        .route("/api/exams/:exam_id/download/reports", get(download_reports))
        .route("/api/exams/:exam_id/answers", post(save_answers))
        .route("/api/exams/:exam_id/answers/:uid", get(saved_answers))
}
