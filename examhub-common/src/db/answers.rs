//! Saved answer queries

use crate::db::models::SavedAnswer;
use crate::db::store;
use crate::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

pub async fn find(pool: &SqlitePool, exam_id: Uuid, uid: &str) -> Result<Option<SavedAnswer>> {
    let doc: Option<String> = sqlx::query_scalar(
        r#"
        SELECT doc FROM saved_answers
        WHERE json_extract(doc, '$.examId') = ? AND json_extract(doc, '$.uid') = ?
        "#,
    )
    .bind(exam_id.to_string())
    .bind(uid)
    .fetch_optional(pool)
    .await?;

    Ok(doc.as_deref().map(serde_json::from_str::<SavedAnswer>).transpose()?)
}

/// Replace the snapshot for (exam, uid) wholesale, creating it if needed
pub async fn upsert(pool: &SqlitePool, mut answer: SavedAnswer) -> Result<SavedAnswer> {
    match find(pool, answer.exam_id, &answer.uid).await? {
        Some(existing) => {
            answer.id = existing.id;
            store::replace(pool, &mut answer).await?;
        }
        None => store::insert(pool, &answer).await?,
    }
    Ok(answer)
}
