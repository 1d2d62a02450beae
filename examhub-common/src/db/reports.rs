//! Exam report queries

use crate::db::models::ExamReport;
use crate::db::store;
use crate::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

pub async fn for_exam(pool: &SqlitePool, exam_id: Uuid) -> Result<Vec<ExamReport>> {
    store::find_by_field(pool, "$.examId", &exam_id.to_string()).await
}

/// The single report for (exam, uid), if any
pub async fn find(pool: &SqlitePool, exam_id: Uuid, uid: &str) -> Result<Option<ExamReport>> {
    let doc: Option<String> = sqlx::query_scalar(
        r#"
        SELECT doc FROM exam_reports
        WHERE json_extract(doc, '$.examId') = ? AND json_extract(doc, '$.uid') = ?
        "#,
    )
    .bind(exam_id.to_string())
    .bind(uid)
    .fetch_optional(pool)
    .await?;

    Ok(doc.as_deref().map(serde_json::from_str::<ExamReport>).transpose()?)
}

/// Insert or overwrite the report for its (exam, uid) pair
///
/// An existing report keeps its id and creation time.
pub async fn upsert(pool: &SqlitePool, mut report: ExamReport) -> Result<ExamReport> {
    match find(pool, report.exam_id, &report.uid).await? {
        Some(existing) => {
            report.id = existing.id;
            report.created_at = existing.created_at;
            store::replace(pool, &mut report).await?;
        }
        None => store::insert(pool, &report).await?,
    }
    Ok(report)
}

pub async fn delete_for_exam(pool: &SqlitePool, exam_id: Uuid) -> Result<u64> {
    store::delete_by_field::<ExamReport>(pool, "$.examId", &exam_id.to_string()).await
}
