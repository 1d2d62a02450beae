//! Exam endpoints
//!
//! Create and update take multipart bodies: scalar fields, a JSON-encoded
//! `questions` array and optional `questionFiles[<index>]` attachments for
//! file-type questions.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use examhub_common::db::models::{Exam, Question, QuestionKind, RosterRef};
use examhub_common::db::store;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use super::multipart::Form;
use crate::error::{ApiError, ApiResult, PathParams};
use crate::storage::{self, BlobStore};
use crate::sync::exams::{self, ExamDraft};
use crate::AppState;

fn owner_from(form: &Form) -> ApiResult<RosterRef> {
    let id = Uuid::parse_str(form.required("class")?)
        .map_err(|_| ApiError::validation("Invalid class id"))?;

    match form.text("ownerKind").unwrap_or("semester") {
        "semester" => Ok(RosterRef::Semester(id)),
        "class" => Ok(RosterRef::Class(id)),
        other => Err(ApiError::validation(format!("Unknown owner kind: {}", other))),
    }
}

/// Store `questionFiles[i]` attachments on their questions
///
/// Returns the URLs written so a failed request can remove them again.
async fn attach_question_files(
    blobs: &dyn BlobStore,
    form: &mut Form,
    questions: &mut [Question],
) -> ApiResult<Vec<String>> {
    let mut stored = Vec::new();

    for (index, file) in form.indexed_files("questionFiles") {
        let Some(QuestionKind::File {
            file_url, file_type, ..
        }) = questions.get_mut(index).map(|q| &mut q.kind)
        else {
            debug!("Ignoring attachment for non-file question {}", index);
            continue;
        };

        if let Err(e) = storage::check_document_type(&file.content_type) {
            storage::delete_quietly(blobs, &stored).await;
            return Err(e.into());
        }
        let path = storage::question_file_path(&file.file_name);
        let url = match blobs.store(&file.bytes, &path, &file.content_type).await {
            Ok(url) => url,
            Err(e) => {
                storage::delete_quietly(blobs, &stored).await;
                return Err(e.into());
            }
        };

        *file_url = Some(url.clone());
        *file_type = Some(file.content_type);
        stored.push(url);
    }

    Ok(stored)
}

/// Parse the form into a draft and upload its attachments
async fn draft_from(blobs: &dyn BlobStore, mut form: Form) -> ApiResult<(ExamDraft, Vec<String>)> {
    let mut draft = ExamDraft {
        title: form.required("title")?.to_string(),
        description: form.text("description").map(str::to_string),
        owner: owner_from(&form)?,
        start_date: form.timestamp("startDate")?,
        end_date: form.timestamp("endDate")?,
        duration: form
            .number("duration")?
            .ok_or_else(|| ApiError::validation("duration is required"))?,
        upload_duration: form.number("uploadDuration")?,
        questions: form
            .json("questions", "Invalid questions format")?
            .ok_or_else(|| ApiError::validation("At least one question is required"))?,
    };

    let uploaded = attach_question_files(blobs, &mut form, &mut draft.questions).await?;
    Ok((draft, uploaded))
}

/// GET /api/exams
pub async fn list_exams(State(state): State<AppState>) -> ApiResult<Json<Vec<Exam>>> {
    Ok(Json(store::find_all(&state.db).await?))
}

/// GET /api/exams/:exam_id
pub async fn get_exam(
    State(state): State<AppState>,
    PathParams(exam_id): PathParams<Uuid>,
) -> ApiResult<Json<Exam>> {
    Ok(Json(store::get(&state.db, exam_id).await?))
}

/// GET /api/exams/:exam_id/questions
pub async fn get_questions(
    State(state): State<AppState>,
    PathParams(exam_id): PathParams<Uuid>,
) -> ApiResult<Json<Vec<Question>>> {
    let exam: Exam = store::get(&state.db, exam_id).await?;
    Ok(Json(exam.questions))
}

/// POST /api/exams (multipart)
pub async fn create_exam(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Exam>)> {
    let form = Form::read(multipart).await?;
    let (draft, uploaded) = draft_from(state.blobs.as_ref(), form).await?;

    match exams::create_exam(&state.db, draft).await {
        Ok(exam) => Ok((StatusCode::CREATED, Json(exam))),
        Err(e) => {
            storage::delete_quietly(state.blobs.as_ref(), &uploaded).await;
            Err(e.into())
        }
    }
}

/// PUT /api/exams/:exam_id (multipart)
pub async fn update_exam(
    State(state): State<AppState>,
    PathParams(exam_id): PathParams<Uuid>,
    multipart: Multipart,
) -> ApiResult<Json<Exam>> {
    let form = Form::read(multipart).await?;
    let (draft, uploaded) = draft_from(state.blobs.as_ref(), form).await?;

    match exams::update_exam(&state.db, state.blobs.as_ref(), exam_id, draft).await {
        Ok(exam) => Ok(Json(exam)),
        Err(e) => {
            storage::delete_quietly(state.blobs.as_ref(), &uploaded).await;
            Err(e.into())
        }
    }
}

/// DELETE /api/exams/:exam_id
pub async fn delete_exam(
    State(state): State<AppState>,
    PathParams(exam_id): PathParams<Uuid>,
) -> ApiResult<Json<Value>> {
    exams::delete_exam(&state.db, exam_id).await?;
    Ok(Json(json!({ "message": "Exam deleted successfully" })))
}

pub fn exam_routes() -> Router<AppState> {
    Router::new()
        .route("/api/exams", get(list_exams).post(create_exam))
        .route(
            "/api/exams/:exam_id",
            get(get_exam).put(update_exam).delete(delete_exam),
        )
        .route("/api/exams/:exam_id/questions", get(get_questions))
}
