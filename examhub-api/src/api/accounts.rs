//! Student, staff and role endpoints

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use examhub_common::db::models::{Staff, Student};
use examhub_common::db::store;
use serde::Deserialize;
use serde_json::{json, Value};

use super::views::{self, StaffView};
use crate::error::{ApiError, ApiResult, JsonBody, PathParams};
use crate::services::accounts::{self, BulkAccounts, Credentials, StaffExam};
use crate::AppState;

/// GET /api/students
pub async fn list_students(State(state): State<AppState>) -> ApiResult<Json<Vec<Student>>> {
    Ok(Json(store::find_all(&state.db).await?))
}

/// POST /api/students
pub async fn create_student(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<Credentials>,
) -> ApiResult<(StatusCode, Json<Student>)> {
    let student = accounts::create_student(&state.db, state.identity.as_ref(), &body).await?;
    Ok((StatusCode::CREATED, Json(student)))
}

/// POST /api/students/bulk
pub async fn bulk_create_students(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<Vec<Credentials>>,
) -> ApiResult<(StatusCode, Json<BulkAccounts<Student>>)> {
    if body.is_empty() {
        return Err(ApiError::validation("A non-empty list of students is required"));
    }
    let outcome = accounts::bulk_create_students(&state.db, state.identity.as_ref(), &body).await;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// DELETE /api/students/:email
pub async fn delete_student(
    State(state): State<AppState>,
    PathParams(email): PathParams<String>,
) -> ApiResult<Json<Value>> {
    accounts::delete_by_email::<Student>(&state.db, state.identity.as_ref(), &email).await?;
    Ok(Json(json!({ "message": "Student deleted" })))
}

/// GET /api/staff
pub async fn list_staff(State(state): State<AppState>) -> ApiResult<Json<Vec<StaffView>>> {
    let staff: Vec<Staff> = store::find_all(&state.db).await?;
    Ok(Json(views::staff(&state.db, staff).await?))
}

/// POST /api/staff
pub async fn create_staff(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<Credentials>,
) -> ApiResult<(StatusCode, Json<Staff>)> {
    let staff = accounts::create_staff(&state.db, state.identity.as_ref(), &body).await?;
    Ok((StatusCode::CREATED, Json(staff)))
}

/// POST /api/staff/bulk
pub async fn bulk_create_staff(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<Vec<Credentials>>,
) -> ApiResult<(StatusCode, Json<BulkAccounts<Staff>>)> {
    if body.is_empty() {
        return Err(ApiError::validation("A non-empty list of staff is required"));
    }
    let outcome = accounts::bulk_create_staff(&state.db, state.identity.as_ref(), &body).await;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// DELETE /api/staff/:account (email)
pub async fn delete_staff(
    State(state): State<AppState>,
    PathParams(email): PathParams<String>,
) -> ApiResult<Json<Value>> {
    accounts::delete_by_email::<Staff>(&state.db, state.identity.as_ref(), &email).await?;
    Ok(Json(json!({ "message": "Staff deleted" })))
}

/// GET /api/staff/:account/exams (external uid)
pub async fn staff_exams(
    State(state): State<AppState>,
    PathParams(uid): PathParams<String>,
) -> ApiResult<Json<Vec<StaffExam>>> {
    Ok(Json(accounts::staff_exams(&state.db, &uid).await?))
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    #[serde(default)]
    pub uid: String,
}

/// POST /api/auth/get-role
pub async fn get_role(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RoleRequest>,
) -> ApiResult<Json<Value>> {
    if body.uid.trim().is_empty() {
        return Err(ApiError::validation("uid is required"));
    }
    let role = accounts::role_of(&state.db, &body.uid).await?;
    Ok(Json(json!({ "role": role })))
}

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/api/students", get(list_students).post(create_student))
        .route("/api/students/bulk", post(bulk_create_students))
        .route("/api/students/:email", delete(delete_student))
        .route("/api/staff", get(list_staff).post(create_staff))
        .route("/api/staff/bulk", post(bulk_create_staff))
        // Email for delete, external uid for the exam list
        .route("/api/staff/:account", delete(delete_staff))
        .route("/api/staff/:account/exams", get(staff_exams))
        .route("/api/auth/get-role", post(get_role))
}
