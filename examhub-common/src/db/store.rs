//! Generic document operations
//!
//! `find`, `findById`, `insert`, `update`, `delete` and `deleteMany` over any
//! [`Document`] type. Each call is a single statement; nothing here spans
//! more than one document, so multi-entity operations are not atomic.

use crate::db::models::{
    Class, Exam, ExamReport, SavedAnswer, School, Staff, Student, Submission,
};
use crate::{Error, Result};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Entity stored as a JSON document in its own table
pub trait Document: Serialize + DeserializeOwned + Send + Sync + Unpin {
    const TABLE: &'static str;
    /// Human-readable kind used in error messages ("Student not found")
    const KIND: &'static str;

    fn id(&self) -> Uuid;

    /// Stamp the modification time before a write
    fn touch(&mut self) {}
}

macro_rules! timestamped_document {
    ($ty:ty, $table:literal, $kind:literal) => {
        impl Document for $ty {
            const TABLE: &'static str = $table;
            const KIND: &'static str = $kind;

            fn id(&self) -> Uuid {
                self.id
            }

            fn touch(&mut self) {
                self.updated_at = Utc::now();
            }
        }
    };
}

timestamped_document!(School, "schools", "School");
timestamped_document!(Class, "classes", "Class");
timestamped_document!(Student, "students", "Student");
timestamped_document!(Staff, "staff", "Staff");
timestamped_document!(Exam, "exams", "Exam");
timestamped_document!(ExamReport, "exam_reports", "Exam report");
timestamped_document!(SavedAnswer, "saved_answers", "Saved answer");

impl Document for Submission {
    const TABLE: &'static str = "submissions";
    const KIND: &'static str = "Submission";

    fn id(&self) -> Uuid {
        self.id
    }
}

fn decode<D: Document>(doc: &str) -> Result<D> {
    Ok(serde_json::from_str(doc)?)
}

fn decode_all<D: Document>(docs: Vec<String>) -> Result<Vec<D>> {
    docs.iter().map(|doc| decode(doc)).collect()
}

/// Translate unique-index violations into `Conflict`
fn write_error<D: Document>(err: sqlx::Error) -> Error {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Error::Conflict(format!("{} already exists", D::KIND))
        }
        _ => Error::Store(err),
    }
}

pub async fn insert<D: Document>(pool: &SqlitePool, doc: &D) -> Result<()> {
    let sql = format!("INSERT INTO {} (id, doc) VALUES (?, ?)", D::TABLE);
    sqlx::query(&sql)
        .bind(doc.id().to_string())
        .bind(serde_json::to_string(doc)?)
        .execute(pool)
        .await
        .map_err(write_error::<D>)?;

    Ok(())
}

pub async fn find_by_id<D: Document>(pool: &SqlitePool, id: Uuid) -> Result<Option<D>> {
    let sql = format!("SELECT doc FROM {} WHERE id = ?", D::TABLE);
    let doc: Option<String> = sqlx::query_scalar(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    doc.as_deref().map(decode::<D>).transpose()
}

/// Like [`find_by_id`] but absence is `NotFound`
pub async fn get<D: Document>(pool: &SqlitePool, id: Uuid) -> Result<D> {
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{} not found", D::KIND)))
}

/// All documents in insertion order
pub async fn find_all<D: Document>(pool: &SqlitePool) -> Result<Vec<D>> {
    let sql = format!("SELECT doc FROM {} ORDER BY rowid", D::TABLE);
    let docs: Vec<String> = sqlx::query_scalar(&sql).fetch_all(pool).await?;

    decode_all(docs)
}

/// Documents whose scalar at `path` (e.g. `$.examId`) equals `value`
pub async fn find_by_field<D: Document>(
    pool: &SqlitePool,
    path: &str,
    value: &str,
) -> Result<Vec<D>> {
    let sql = format!(
        "SELECT doc FROM {} WHERE json_extract(doc, ?) = ? ORDER BY rowid",
        D::TABLE
    );
    let docs: Vec<String> = sqlx::query_scalar(&sql)
        .bind(path)
        .bind(value)
        .fetch_all(pool)
        .await?;

    decode_all(docs)
}

/// Documents whose id array at `path` (e.g. `$.exams`) contains `id`
pub async fn find_containing<D: Document>(
    pool: &SqlitePool,
    path: &str,
    id: Uuid,
) -> Result<Vec<D>> {
    let sql = format!(
        "SELECT t.doc FROM {} t WHERE EXISTS \
         (SELECT 1 FROM json_each(t.doc, ?) e WHERE e.value = ?) ORDER BY t.rowid",
        D::TABLE
    );
    let docs: Vec<String> = sqlx::query_scalar(&sql)
        .bind(path)
        .bind(id.to_string())
        .fetch_all(pool)
        .await?;

    decode_all(docs)
}

/// Documents with the given ids, in insertion order; unknown ids are skipped
pub async fn find_by_ids<D: Document>(pool: &SqlitePool, ids: &[Uuid]) -> Result<Vec<D>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let id_list = serde_json::to_string(&ids)?;
    let sql = format!(
        "SELECT doc FROM {} WHERE id IN (SELECT value FROM json_each(?)) ORDER BY rowid",
        D::TABLE
    );
    let docs: Vec<String> = sqlx::query_scalar(&sql)
        .bind(id_list)
        .fetch_all(pool)
        .await?;

    decode_all(docs)
}

/// Write the full document back; `NotFound` if it was deleted meanwhile
pub async fn replace<D: Document>(pool: &SqlitePool, doc: &mut D) -> Result<()> {
    doc.touch();

    let sql = format!("UPDATE {} SET doc = ? WHERE id = ?", D::TABLE);
    let result = sqlx::query(&sql)
        .bind(serde_json::to_string(doc)?)
        .bind(doc.id().to_string())
        .execute(pool)
        .await
        .map_err(write_error::<D>)?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("{} not found", D::KIND)));
    }

    Ok(())
}

/// Delete by id; returns whether a document was removed
pub async fn delete<D: Document>(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let sql = format!("DELETE FROM {} WHERE id = ?", D::TABLE);
    let result = sqlx::query(&sql)
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete every document whose scalar at `path` equals `value`
pub async fn delete_by_field<D: Document>(
    pool: &SqlitePool,
    path: &str,
    value: &str,
) -> Result<u64> {
    let sql = format!("DELETE FROM {} WHERE json_extract(doc, ?) = ?", D::TABLE);
    let result = sqlx::query(&sql)
        .bind(path)
        .bind(value)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
