//! Class (flat roster) endpoints

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use examhub_common::db::models::{Class, RosterRef};
use examhub_common::db::store;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::schools::{EmailBody, NameBody};
use super::views::{self, ClassView};
use crate::error::{ApiError, ApiResult, JsonBody, PathParams};
use crate::sync::enrollment::{self, Enrolled, EntryError};
use crate::sync::{hierarchy, Roster};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BulkStudentsBody {
    #[serde(default)]
    pub students: Vec<EmailBody>,
}

#[derive(Serialize)]
pub struct BulkClassResponse {
    pub created: Vec<Enrolled>,
    pub errors: Vec<EntryError>,
    pub class: ClassView,
}

async fn class_roster(state: &AppState, class_id: Uuid) -> ApiResult<Roster> {
    Ok(Roster::get(&state.db, RosterRef::Class(class_id)).await?)
}

async fn view_of(state: &AppState, roster: &Roster) -> ApiResult<ClassView> {
    match roster {
        Roster::Class(class) => Ok(views::class(&state.db, class).await?),
        Roster::Semester(_) => Err(ApiError::not_found("Class not found")),
    }
}

/// GET /api/classes
pub async fn list_classes(State(state): State<AppState>) -> ApiResult<Json<Vec<ClassView>>> {
    let classes: Vec<Class> = store::find_all(&state.db).await?;
    Ok(Json(views::classes(&state.db, &classes).await?))
}

/// GET /api/classes/:class_id
pub async fn get_class(
    State(state): State<AppState>,
    PathParams(class_id): PathParams<Uuid>,
) -> ApiResult<Json<ClassView>> {
    let class: Class = store::get(&state.db, class_id).await?;
    Ok(Json(views::class(&state.db, &class).await?))
}

/// POST /api/classes
pub async fn create_class(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<NameBody>,
) -> ApiResult<(StatusCode, Json<ClassView>)> {
    let class = hierarchy::create_class(&state.db, &body.name).await?;
    Ok((StatusCode::CREATED, Json(views::class(&state.db, &class).await?)))
}

/// PUT /api/classes/:class_id
pub async fn rename_class(
    State(state): State<AppState>,
    PathParams(class_id): PathParams<Uuid>,
    JsonBody(body): JsonBody<NameBody>,
) -> ApiResult<Json<ClassView>> {
    let class = hierarchy::rename_class(&state.db, class_id, &body.name).await?;
    Ok(Json(views::class(&state.db, &class).await?))
}

/// DELETE /api/classes/:class_id
pub async fn delete_class(
    State(state): State<AppState>,
    PathParams(class_id): PathParams<Uuid>,
) -> ApiResult<Json<Value>> {
    hierarchy::delete_class(&state.db, class_id).await?;
    Ok(Json(json!({ "message": "Class deleted" })))
}

/// POST /api/classes/:class_id/students
pub async fn add_student(
    State(state): State<AppState>,
    PathParams(class_id): PathParams<Uuid>,
    JsonBody(body): JsonBody<EmailBody>,
) -> ApiResult<Json<ClassView>> {
    let mut roster = class_roster(&state, class_id).await?;
    enrollment::add_student(&state.db, &mut roster, &body.email).await?;
    Ok(Json(view_of(&state, &roster).await?))
}

/// POST /api/classes/:class_id/bulk-students
pub async fn bulk_add_students(
    State(state): State<AppState>,
    PathParams(class_id): PathParams<Uuid>,
    JsonBody(body): JsonBody<BulkStudentsBody>,
) -> ApiResult<(StatusCode, Json<BulkClassResponse>)> {
    if body.students.is_empty() {
        return Err(ApiError::validation("A non-empty list of students is required"));
    }
    let emails: Vec<String> = body.students.into_iter().map(|s| s.email).collect();

    let mut roster = class_roster(&state, class_id).await?;
    let outcome = enrollment::bulk_add(&state.db, &mut roster, &emails).await?;

    Ok((
        StatusCode::CREATED,
        Json(BulkClassResponse {
            created: outcome.created,
            errors: outcome.errors,
            class: view_of(&state, &roster).await?,
        }),
    ))
}

/// DELETE /api/classes/:class_id/students/:email
pub async fn remove_student(
    State(state): State<AppState>,
    PathParams((class_id, email)): PathParams<(Uuid, String)>,
) -> ApiResult<Json<ClassView>> {
    let mut roster = class_roster(&state, class_id).await?;
    enrollment::remove_student(&state.db, &mut roster, &email).await?;
    Ok(Json(view_of(&state, &roster).await?))
}

pub fn class_routes() -> Router<AppState> {
    Router::new()
        .route("/api/classes", get(list_classes).post(create_class))
        .route(
            "/api/classes/:class_id",
            get(get_class).put(rename_class).delete(delete_class),
        )
        .route("/api/classes/:class_id/students", post(add_student))
        .route("/api/classes/:class_id/bulk-students", post(bulk_add_students))
        .route("/api/classes/:class_id/students/:email", delete(remove_student))
}
