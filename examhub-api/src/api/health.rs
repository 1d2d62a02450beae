//! Health check and banner endpoints

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;

pub const BANNER: &str = "Online Exam Monitoring API Running...";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    /// `connected` or `disconnected`
    pub database: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: i64,
}

/// GET /health
///
/// Always answers 200; store reachability is reported in the body.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => "connected",
        Err(e) => {
            tracing::warn!("Health check database probe failed: {}", e);
            "disconnected"
        }
    };

    let now = Utc::now();
    Json(HealthResponse {
        status: "OK".to_string(),
        module: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database.to_string(),
        timestamp: now,
        uptime_seconds: (now - state.startup_time).num_seconds(),
    })
}

/// GET /
pub async fn banner() -> &'static str {
    BANNER
}

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health_check))
}
