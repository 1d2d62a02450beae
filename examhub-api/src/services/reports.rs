//! Proctoring reports
//!
//! One report per (exam, student). Progress snapshots keep it incomplete;
//! uploading the final PDF completes it, after which it is frozen.

use chrono::{DateTime, Utc};
use examhub_common::db::models::{Exam, ExamReport, Snapshot, Violations};
use examhub_common::db::{reports, store};
use examhub_common::{Error, Result};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use super::{student_by_uid, UploadedFile};
use crate::storage::{self, BlobStore};

/// Proctoring data that accompanies a progress update or the final upload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDetails {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub violations: Violations,
    #[serde(default)]
    pub exam_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub exam_end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub word_counts: Snapshot,
    #[serde(default)]
    pub user_answers: Snapshot,
}

impl ReportDetails {
    fn apply_to(self, report: &mut ExamReport) {
        report.total_violations = self.violations.total();
        report.violations = self.violations;
        report.exam_start_time = self.exam_start_time.or(report.exam_start_time);
        report.exam_end_time = self.exam_end_time.or(report.exam_end_time);
        report.word_counts = self.word_counts;
        report.user_answers = self.user_answers;
        report.generated_at = Utc::now();
    }
}

/// Existing report for the pair, or a fresh placeholder; completed ones are rejected
async fn open_report(pool: &SqlitePool, exam_id: Uuid, uid: &str) -> Result<ExamReport> {
    let student = student_by_uid(pool, uid).await?;
    store::get::<Exam>(pool, exam_id).await?;

    match reports::find(pool, exam_id, uid).await? {
        Some(existing) if existing.completed => Err(Error::Conflict(
            "Exam report already submitted".to_string(),
        )),
        Some(existing) => Ok(existing),
        None => Ok(ExamReport::placeholder(exam_id, &student)),
    }
}

/// Record an incomplete progress snapshot
pub async fn record_progress(pool: &SqlitePool, exam_id: Uuid, details: ReportDetails) -> Result<ExamReport> {
    let mut report = open_report(pool, exam_id, &details.uid).await?;
    details.apply_to(&mut report);
    reports::upsert(pool, report).await
}

/// Store the final PDF and complete the report
pub async fn upload_report(
    pool: &SqlitePool,
    blobs: &dyn BlobStore,
    exam_id: Uuid,
    details: ReportDetails,
    file: UploadedFile,
) -> Result<ExamReport> {
    storage::check_report_file(&file.content_type, file.bytes.len())?;
    let mut report = open_report(pool, exam_id, &details.uid).await?;

    let path = storage::report_path(exam_id, &details.uid, &file.file_name);
    let url = blobs.store(&file.bytes, &path, &file.content_type).await?;

    details.apply_to(&mut report);
    report.report_url = Some(url.clone());
    report.completed = true;
    let report = match reports::upsert(pool, report).await {
        Ok(report) => report,
        Err(e) => {
            storage::delete_quietly(blobs, &[url]).await;
            return Err(e);
        }
    };

    info!(
        "Report for exam {} by {} completed ({} violation(s))",
        exam_id, report.uid, report.total_violations
    );
    Ok(report)
}

pub async fn get_report(pool: &SqlitePool, exam_id: Uuid, uid: &str) -> Result<ExamReport> {
    reports::find(pool, exam_id, uid)
        .await?
        .ok_or_else(|| Error::NotFound("Report not found".to_string()))
}
