//! School, program and semester endpoints
//!
//! Semester enrollment routes name the whole school / program / semester
//! path and reject it if any level is missing.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use examhub_common::db::models::{Program, School};
use examhub_common::db::store;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::views::{self, ProgramView, SchoolView, SemesterView};
use crate::error::{ApiError, ApiResult, JsonBody, PathParams};
use crate::sync::enrollment::{self, EntryError};
use crate::sync::resolver::locate_semester_in;
use crate::sync::{hierarchy, Roster};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct NameBody {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailBody {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailsBody {
    #[serde(default)]
    pub emails: Vec<String>,
}

type SemesterPath = PathParams<(Uuid, Uuid, Uuid)>;

fn program_of(school: &School, program_id: Uuid) -> ApiResult<&Program> {
    school
        .program(program_id)
        .ok_or_else(|| ApiError::not_found("Program not found"))
}

/// GET /api/schools
pub async fn list_schools(State(state): State<AppState>) -> ApiResult<Json<Vec<SchoolView>>> {
    let schools: Vec<School> = store::find_all(&state.db).await?;
    if schools.is_empty() {
        return Err(ApiError::not_found("No schools found"));
    }
    Ok(Json(views::schools(&state.db, &schools).await?))
}

/// GET /api/schools/:school_id
pub async fn get_school(
    State(state): State<AppState>,
    PathParams(school_id): PathParams<Uuid>,
) -> ApiResult<Json<SchoolView>> {
    let school: School = store::get(&state.db, school_id).await?;
    Ok(Json(views::school(&state.db, &school).await?))
}

/// POST /api/schools
pub async fn create_school(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<NameBody>,
) -> ApiResult<(StatusCode, Json<School>)> {
    let school = hierarchy::create_school(&state.db, &body.name).await?;
    Ok((StatusCode::CREATED, Json(school)))
}

/// PUT /api/schools/:school_id
pub async fn rename_school(
    State(state): State<AppState>,
    PathParams(school_id): PathParams<Uuid>,
    JsonBody(body): JsonBody<NameBody>,
) -> ApiResult<Json<SchoolView>> {
    let school = hierarchy::rename_school(&state.db, school_id, &body.name).await?;
    Ok(Json(views::school(&state.db, &school).await?))
}

/// DELETE /api/schools/:school_id
pub async fn delete_school(
    State(state): State<AppState>,
    PathParams(school_id): PathParams<Uuid>,
) -> ApiResult<Json<Value>> {
    hierarchy::delete_school(&state.db, school_id).await?;
    Ok(Json(json!({ "message": "School deleted successfully" })))
}

/// POST /api/schools/:school_id/programs
pub async fn add_program(
    State(state): State<AppState>,
    PathParams(school_id): PathParams<Uuid>,
    JsonBody(body): JsonBody<NameBody>,
) -> ApiResult<(StatusCode, Json<ProgramView>)> {
    let school = hierarchy::add_program(&state.db, school_id, &body.name).await?;
    let added = school
        .programs
        .last()
        .ok_or_else(|| ApiError::not_found("Program not found"))?;
    Ok((StatusCode::CREATED, Json(views::program(&state.db, added).await?)))
}

/// PUT /api/schools/:school_id/programs/:program_id
pub async fn rename_program(
    State(state): State<AppState>,
    PathParams((school_id, program_id)): PathParams<(Uuid, Uuid)>,
    JsonBody(body): JsonBody<NameBody>,
) -> ApiResult<Json<ProgramView>> {
    let school = hierarchy::rename_program(&state.db, school_id, program_id, &body.name).await?;
    let program = program_of(&school, program_id)?;
    Ok(Json(views::program(&state.db, program).await?))
}

/// DELETE /api/schools/:school_id/programs/:program_id
pub async fn delete_program(
    State(state): State<AppState>,
    PathParams((school_id, program_id)): PathParams<(Uuid, Uuid)>,
) -> ApiResult<Json<Value>> {
    hierarchy::delete_program(&state.db, school_id, program_id).await?;
    Ok(Json(json!({ "message": "Program deleted successfully" })))
}

/// POST /api/schools/:school_id/programs/:program_id/semesters
pub async fn add_semester(
    State(state): State<AppState>,
    PathParams((school_id, program_id)): PathParams<(Uuid, Uuid)>,
    JsonBody(body): JsonBody<NameBody>,
) -> ApiResult<(StatusCode, Json<SemesterView>)> {
    let school = hierarchy::add_semester(&state.db, school_id, program_id, &body.name).await?;
    let added = program_of(&school, program_id)?
        .semesters
        .last()
        .ok_or_else(|| ApiError::not_found("Semester not found"))?;
    Ok((StatusCode::CREATED, Json(views::semester(&state.db, added).await?)))
}

/// PUT /api/schools/:school_id/programs/:program_id/semesters/:semester_id
pub async fn rename_semester(
    State(state): State<AppState>,
    PathParams((school_id, program_id, semester_id)): SemesterPath,
    JsonBody(body): JsonBody<NameBody>,
) -> ApiResult<Json<SemesterView>> {
    let school =
        hierarchy::rename_semester(&state.db, school_id, program_id, semester_id, &body.name).await?;
    let semester = program_of(&school, program_id)?
        .semesters
        .iter()
        .find(|s| s.id == semester_id)
        .ok_or_else(|| ApiError::not_found("Semester not found"))?;
    Ok(Json(views::semester(&state.db, semester).await?))
}

/// DELETE /api/schools/:school_id/programs/:program_id/semesters/:semester_id
pub async fn delete_semester(
    State(state): State<AppState>,
    PathParams((school_id, program_id, semester_id)): SemesterPath,
) -> ApiResult<Json<Value>> {
    hierarchy::delete_semester(&state.db, school_id, program_id, semester_id).await?;
    Ok(Json(json!({ "message": "Semester deleted successfully" })))
}

async fn semester_roster(state: &AppState, (school, program, semester): (Uuid, Uuid, Uuid)) -> ApiResult<Roster> {
    let location = locate_semester_in(&state.db, school, program, semester).await?;
    Ok(Roster::Semester(location))
}

/// Render the semester as stored after an enrollment change
async fn semester_view(state: &AppState, (school, program, semester): (Uuid, Uuid, Uuid)) -> ApiResult<SemesterView> {
    let location = locate_semester_in(&state.db, school, program, semester).await?;
    Ok(views::semester(&state.db, location.semester()).await?)
}

/// POST .../semesters/:semester_id/students
pub async fn add_student(
    State(state): State<AppState>,
    PathParams(path): SemesterPath,
    JsonBody(body): JsonBody<EmailBody>,
) -> ApiResult<(StatusCode, Json<SemesterView>)> {
    let mut roster = semester_roster(&state, path).await?;
    enrollment::add_student(&state.db, &mut roster, &body.email).await?;
    Ok((StatusCode::CREATED, Json(semester_view(&state, path).await?)))
}

#[derive(Serialize)]
pub struct BulkSemesterResponse {
    pub created: Vec<enrollment::Enrolled>,
    pub errors: Vec<EntryError>,
    pub semester: SemesterView,
}

/// POST .../semesters/:semester_id/students/bulk
pub async fn bulk_add_students(
    State(state): State<AppState>,
    PathParams(path): SemesterPath,
    JsonBody(body): JsonBody<EmailsBody>,
) -> ApiResult<(StatusCode, Json<BulkSemesterResponse>)> {
    if body.emails.is_empty() {
        return Err(ApiError::validation("A non-empty list of emails is required"));
    }
    let mut roster = semester_roster(&state, path).await?;
    let outcome = enrollment::bulk_add(&state.db, &mut roster, &body.emails).await?;

    Ok((
        StatusCode::CREATED,
        Json(BulkSemesterResponse {
            created: outcome.created,
            errors: outcome.errors,
            semester: semester_view(&state, path).await?,
        }),
    ))
}

/// DELETE .../semesters/:semester_id/students/:email
pub async fn remove_student(
    State(state): State<AppState>,
    PathParams((school, program, semester, email)): PathParams<(Uuid, Uuid, Uuid, String)>,
) -> ApiResult<Json<SemesterView>> {
    let path = (school, program, semester);
    let mut roster = semester_roster(&state, path).await?;
    enrollment::remove_student(&state.db, &mut roster, &email).await?;
    Ok(Json(semester_view(&state, path).await?))
}

pub fn school_routes() -> Router<AppState> {
    const SEMESTER: &str = "/api/schools/:school_id/programs/:program_id/semesters/:semester_id";

    Router::new()
        .route("/api/schools", get(list_schools).post(create_school))
        .route(
            "/api/schools/:school_id",
            get(get_school).put(rename_school).delete(delete_school),
        )
        .route("/api/schools/:school_id/programs", post(add_program))
        .route(
            "/api/schools/:school_id/programs/:program_id",
            put(rename_program).delete(delete_program),
        )
        .route(
            "/api/schools/:school_id/programs/:program_id/semesters",
            post(add_semester),
        )
        .route(SEMESTER, put(rename_semester).delete(delete_semester))
        .route(&format!("{}/students", SEMESTER), post(add_student))
        .route(&format!("{}/students/bulk", SEMESTER), post(bulk_add_students))
        .route(&format!("{}/students/:email", SEMESTER), delete(remove_student))
}
