//! Bulk ZIP downloads of an exam's files
//!
//! The archive is fed from a background task so the response starts
//! streaming while later files are still being fetched.

use axum::body::Body;
use examhub_common::db::models::Exam;
use examhub_common::db::{reports, store, submissions};
use examhub_common::{Error, Result};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::archive::ArchiveBuilder;
use crate::storage::{file_name_from_url, BlobStore};

/// A named archive ready to be sent
pub struct Download {
    pub file_name: String,
    pub body: Body,
}

/// `<title>_<suffix>.zip` with everything but `[A-Za-z0-9_-]` replaced
pub fn archive_name(title: &str, suffix: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_{}.zip", cleaned, suffix)
}

/// (entry name, blob URL)
type Entry = (String, String);

fn stream_archive(blobs: Arc<dyn BlobStore>, exam_id: Uuid, entries: Vec<Entry>) -> Body {
    let (archive, stream) = ArchiveBuilder::open();

    tokio::spawn(async move {
        for (name, url) in entries {
            let bytes = match blobs.fetch(&url).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Skipping {} in archive for exam {}: {}", url, exam_id, e);
                    continue;
                }
            };
            if let Err(e) = archive.append(name, bytes).await {
                warn!("Archive for exam {} stopped early: {}", exam_id, e);
                break;
            }
        }

        match archive.finalize().await {
            Ok(count) => info!("Streamed {} file(s) for exam {}", count, exam_id),
            Err(e) => warn!("Archive for exam {} failed: {}", exam_id, e),
        }
    });

    stream.into_body()
}

pub async fn submissions_archive(
    pool: &sqlx::SqlitePool,
    blobs: Arc<dyn BlobStore>,
    exam_id: Uuid,
) -> Result<Download> {
    let exam: Exam = store::get(pool, exam_id).await?;
    let entries: Vec<Entry> = submissions::for_exam(pool, exam_id)
        .await?
        .into_iter()
        .map(|s| {
            let name = format!("{}_Q{}_{}", s.uid, s.question_id, file_name_from_url(&s.file_url));
            (name, s.file_url)
        })
        .collect();

    if entries.is_empty() {
        return Err(Error::NotFound("No submissions found for this exam".to_string()));
    }

    Ok(Download {
        file_name: archive_name(&exam.title, "submissions"),
        body: stream_archive(blobs, exam_id, entries),
    })
}

pub async fn reports_archive(
    pool: &sqlx::SqlitePool,
    blobs: Arc<dyn BlobStore>,
    exam_id: Uuid,
) -> Result<Download> {
    let exam: Exam = store::get(pool, exam_id).await?;
    let entries: Vec<Entry> = reports::for_exam(pool, exam_id)
        .await?
        .into_iter()
        .filter_map(|r| {
            let url = r.report_url?;
            let name = format!("{}_ExamReport_{}", r.uid, file_name_from_url(&url));
            Some((name, url))
        })
        .collect();

    if entries.is_empty() {
        return Err(Error::NotFound("No reports found for this exam".to_string()));
    }

    Ok(Download {
        file_name: archive_name(&exam.title, "reports"),
        body: stream_archive(blobs, exam_id, entries),
    })
}
