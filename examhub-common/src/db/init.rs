//! Database initialization
//!
//! Every entity kind lives in a document table `(id, doc)` where `doc` is
//! the entity's JSON form. Uniqueness rules are expression indexes over
//! `json_extract`, so duplicate writes fail inside SQLite and surface as
//! `Conflict`.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Document tables, in creation order
pub const DOCUMENT_TABLES: &[&str] = &[
    "schools",
    "classes",
    "students",
    "staff",
    "exams",
    "submissions",
    "exam_reports",
    "saved_answers",
];

/// Open (creating if needed) the database file and ensure the schema exists
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets readers proceed while one request writes
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_tables(&pool).await?;

    Ok(pool)
}

/// In-memory database for tests and non-production fallback
///
/// Each SQLite memory connection is its own database, so the pool holds
/// exactly one connection that is never recycled.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    create_tables(&pool).await?;

    Ok(pool)
}

/// Create document tables and uniqueness indexes (idempotent)
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    for table in DOCUMENT_TABLES {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, doc TEXT NOT NULL)",
            table
        );
        sqlx::query(&sql).execute(pool).await?;
    }

    create_account_indexes(pool, "students").await?;
    create_account_indexes(pool, "staff").await?;
    create_pair_index(pool, "exam_reports").await?;
    create_pair_index(pool, "saved_answers").await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_submissions_exam
        ON submissions (json_extract(doc, '$.examId'))
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Email (case-insensitive) and external id are unique per account table
async fn create_account_indexes(pool: &SqlitePool, table: &str) -> Result<()> {
    let email = format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_email ON {table} (lower(json_extract(doc, '$.email')))"
    );
    let uid = format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_uid ON {table} (json_extract(doc, '$.uid'))"
    );

    sqlx::query(&email).execute(pool).await?;
    sqlx::query(&uid).execute(pool).await?;

    Ok(())
}

/// One document per (exam, uid)
async fn create_pair_index(pool: &SqlitePool, table: &str) -> Result<()> {
    let sql = format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_exam_uid ON {table} (json_extract(doc, '$.examId'), json_extract(doc, '$.uid'))"
    );
    sqlx::query(&sql).execute(pool).await?;

    Ok(())
}
