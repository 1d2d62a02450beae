//! HTTP API handlers

pub mod accounts;
pub mod attempts;
pub mod classes;
pub mod exams;
pub mod health;
pub mod multipart;
pub mod schools;
pub mod views;

use axum::Router;

use crate::AppState;

pub use accounts::account_routes;
pub use attempts::attempt_routes;
pub use classes::class_routes;
pub use exams::exam_routes;
pub use health::health_routes;
pub use schools::school_routes;

/// Every route the service answers
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health_routes())
        .merge(school_routes())
        .merge(class_routes())
        .merge(account_routes())
        .merge(exam_routes())
        .merge(attempt_routes())
}
