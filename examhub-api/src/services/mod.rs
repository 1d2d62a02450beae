//! Account and attempt services
//!
//! Request-level operations that sit on top of the store and the
//! collaborator adapters but do not touch roster references.

pub mod accounts;
pub mod answers;
pub mod downloads;
pub mod reports;
pub mod submissions;

use examhub_common::db::accounts::find_by_uid;
use examhub_common::db::models::Student;
use examhub_common::{Error, Result};
use sqlx::SqlitePool;

/// A file part received from a multipart body
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

pub(crate) async fn student_by_uid(pool: &SqlitePool, uid: &str) -> Result<Student> {
    find_by_uid::<Student>(pool, uid)
        .await?
        .ok_or_else(|| Error::NotFound("Student not found".to_string()))
}
