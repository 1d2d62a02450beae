//! Submission queries

use crate::db::models::Submission;
use crate::db::store;
use crate::Result;
use sqlx::SqlitePool;
use std::collections::HashSet;
use uuid::Uuid;

pub async fn for_exam(pool: &SqlitePool, exam_id: Uuid) -> Result<Vec<Submission>> {
    store::find_by_field(pool, "$.examId", &exam_id.to_string()).await
}

pub async fn for_student(pool: &SqlitePool, exam_id: Uuid, uid: &str) -> Result<Vec<Submission>> {
    let submissions = for_exam(pool, exam_id).await?;
    Ok(submissions.into_iter().filter(|s| s.uid == uid).collect())
}

/// Question ids that at least one submission of this exam points at
pub async fn referenced_questions(pool: &SqlitePool, exam_id: Uuid) -> Result<HashSet<Uuid>> {
    let submissions = for_exam(pool, exam_id).await?;
    Ok(submissions.into_iter().map(|s| s.question_id).collect())
}

pub async fn delete_for_exam(pool: &SqlitePool, exam_id: Uuid) -> Result<u64> {
    store::delete_by_field::<Submission>(pool, "$.examId", &exam_id.to_string()).await
}
