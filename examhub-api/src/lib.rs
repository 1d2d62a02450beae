//! examhub-api library - exam administration service
//!
//! School hierarchy, class rosters, accounts, exams and exam attempts over a
//! document store, with every denormalized back-reference kept in step by
//! the [`sync`] layer.

use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;

pub mod api;
pub mod archive;
pub mod error;
pub mod identity;
pub mod services;
pub mod storage;
pub mod sync;

use identity::IdentityGateway;
use storage::BlobStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub blobs: Arc<dyn BlobStore>,
    pub identity: Arc<dyn IdentityGateway>,
    /// Directory served at `/files`, when blobs live on the local filesystem
    pub files_root: Option<PathBuf>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        blobs: Arc<dyn BlobStore>,
        identity: Arc<dyn IdentityGateway>,
        files_root: Option<PathBuf>,
    ) -> Self {
        Self {
            db,
            blobs,
            identity,
            files_root,
            startup_time: Utc::now(),
        }
    }
}

async fn route_not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Route not found" })),
    )
}

/// Build application router
///
/// Transport layers (CORS, tracing, limits) are added by the binary.
pub fn build_router(state: AppState) -> Router {
    let mut router = api::api_routes();

    if let Some(root) = &state.files_root {
        router = router.nest_service("/files", ServeDir::new(root));
    }

    router.fallback(route_not_found).with_state(state)
}

/// Bound request handling time, answering expired requests with a JSON 408
pub fn with_request_timeout(router: Router, timeout: Duration) -> Router {
    router
        .layer(TimeoutLayer::new(timeout))
        .layer(middleware::map_response(timeout_as_json))
}

// The timeout layer answers with an empty 408 body
async fn timeout_as_json(response: Response) -> Response {
    if response.status() == StatusCode::REQUEST_TIMEOUT {
        return (
            StatusCode::REQUEST_TIMEOUT,
            Json(json!({ "error": "Request timed out" })),
        )
            .into_response();
    }
    response
}
