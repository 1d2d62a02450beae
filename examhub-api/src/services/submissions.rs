//! Student answer files and attendance

use chrono::Utc;
use examhub_common::db::models::{Exam, QuestionKind, Student, Submission};
use examhub_common::db::{reports, store, submissions};
use examhub_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use super::{student_by_uid, UploadedFile};
use crate::storage::{self, BlobStore};
use crate::sync::Roster;

/// Store an answer file for a file-type question and record it
pub async fn upload_submission(
    pool: &SqlitePool,
    blobs: &dyn BlobStore,
    exam_id: Uuid,
    question_id: Uuid,
    uid: &str,
    file: UploadedFile,
) -> Result<Submission> {
    storage::check_document_type(&file.content_type)?;
    let student = student_by_uid(pool, uid).await?;
    let exam: Exam = store::get(pool, exam_id).await?;

    match exam.question(question_id).map(|q| &q.kind) {
        Some(QuestionKind::File { .. }) => {}
        Some(_) => {
            return Err(Error::InvalidReference(format!(
                "Question {} does not accept file uploads",
                question_id
            )))
        }
        None => {
            return Err(Error::InvalidReference(format!(
                "Invalid question ID: {}",
                question_id
            )))
        }
    }

    let path = storage::submission_path(exam_id, uid, &file.file_name);
    let file_url = blobs.store(&file.bytes, &path, &file.content_type).await?;

    let submission = Submission {
        id: Uuid::new_v4(),
        exam_id,
        question_id,
        uid: uid.to_string(),
        student_id: student.id,
        file_url,
        timestamp: Utc::now(),
    };
    if let Err(e) = store::insert(pool, &submission).await {
        storage::delete_quietly(blobs, std::slice::from_ref(&submission.file_url)).await;
        return Err(e);
    }

    info!(
        "Stored submission {} for exam {} question {} by {}",
        submission.id, exam_id, question_id, uid
    );
    Ok(submission)
}

/// Submissions of one student; empty when there are none
pub async fn for_student(pool: &SqlitePool, exam_id: Uuid, uid: &str) -> Result<Vec<Submission>> {
    store::get::<Exam>(pool, exam_id).await?;
    student_by_uid(pool, uid).await?;
    submissions::for_student(pool, exam_id, uid).await
}

#[derive(Debug, Serialize)]
pub struct Attendance {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub email: String,
    pub uid: String,
    pub attended: bool,
}

/// Roster of the exam's owner, each flagged by whether a completed report exists
pub async fn attendance(pool: &SqlitePool, exam_id: Uuid) -> Result<Vec<Attendance>> {
    let exam: Exam = store::get(pool, exam_id).await?;
    let roster = Roster::resolve(pool, exam.owner).await?.ok_or_else(|| {
        Error::NotFound(format!(
            "No {} associated with this exam",
            exam.owner.label().to_lowercase()
        ))
    })?;

    let completed: HashMap<String, bool> = reports::for_exam(pool, exam_id)
        .await?
        .into_iter()
        .map(|report| (report.uid, report.completed))
        .collect();

    Ok(store::find_by_ids::<Student>(pool, roster.students())
        .await?
        .into_iter()
        .map(|student| Attendance {
            attended: completed.get(&student.uid).copied().unwrap_or(false),
            id: student.id,
            email: student.email,
            uid: student.uid,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalBlobStore;
    use crate::sync::enrollment;
    use chrono::Duration;
    use examhub_common::db::init_memory_database;
    use examhub_common::db::models::{Class, ExamReport, Question, RosterRef};
    use tempfile::TempDir;

    struct Fixture {
        pool: SqlitePool,
        blobs: LocalBlobStore,
        _dir: TempDir,
        exam: Exam,
        class: Class,
    }

    async fn fixture() -> Fixture {
        let pool = init_memory_database().await.unwrap();
        let dir = TempDir::new().unwrap();
        let blobs = LocalBlobStore::new(dir.path().to_path_buf(), "http://localhost/files");

        let class = Class::new("Art".into());
        store::insert(&pool, &class).await.unwrap();
        let now = Utc::now();
        let exam = Exam {
            id: Uuid::new_v4(),
            title: "Portfolio".into(),
            description: None,
            owner: RosterRef::Class(class.id),
            start_date: now,
            end_date: now + Duration::hours(1),
            duration: 60,
            upload_duration: Some(10),
            questions: vec![
                Question {
                    id: Uuid::new_v4(),
                    description: "Upload a sketch".into(),
                    kind: QuestionKind::File {
                        file_types_allowed: None,
                        file_url: None,
                        file_type: None,
                    },
                },
                Question {
                    id: Uuid::new_v4(),
                    description: "Describe it".into(),
                    kind: QuestionKind::Descriptive,
                },
            ],
            created_at: now,
            updated_at: now,
        };
        store::insert(&pool, &exam).await.unwrap();

        for n in 1..=2 {
            let student = Student::new(format!("uid-{}", n), format!("s{}@example.org", n));
            store::insert(&pool, &student).await.unwrap();
        }

        Fixture {
            pool,
            blobs,
            _dir: dir,
            exam,
            class,
        }
    }

    fn png() -> UploadedFile {
        UploadedFile {
            file_name: "sketch.png".into(),
            content_type: "image/png".into(),
            bytes: vec![0x89, b'P', b'N', b'G'],
        }
    }

    #[tokio::test]
    async fn test_upload_records_submission() {
        let f = fixture().await;
        let question = f.exam.questions[0].id;

        let submission = upload_submission(&f.pool, &f.blobs, f.exam.id, question, "uid-1", png())
            .await
            .unwrap();

        assert!(submission.file_url.starts_with("http://localhost/files/student-submissions/"));
        let listed = for_student(&f.pool, f.exam.id, "uid-1").await.unwrap();
        assert_eq!(listed, vec![submission]);
        assert!(for_student(&f.pool, f.exam.id, "uid-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_requires_file_question_of_exam() {
        let f = fixture().await;

        let descriptive = f.exam.questions[1].id;
        let err = upload_submission(&f.pool, &f.blobs, f.exam.id, descriptive, "uid-1", png())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidReference(_)));

        let err = upload_submission(&f.pool, &f.blobs, f.exam.id, Uuid::new_v4(), "uid-1", png())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidReference(_)));

        let mut text = png();
        text.content_type = "text/plain".into();
        let err = upload_submission(&f.pool, &f.blobs, f.exam.id, f.exam.questions[0].id, "uid-1", text)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    fn stored_files(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .map(|path| if path.is_dir() { stored_files(&path) } else { 1 })
            .sum()
    }

    #[tokio::test]
    async fn test_failed_record_removes_uploaded_file() {
        let f = fixture().await;
        sqlx::query(
            "CREATE TRIGGER reject_submissions BEFORE INSERT ON submissions \
             BEGIN SELECT RAISE(ABORT, 'rejected'); END",
        )
        .execute(&f.pool)
        .await
        .unwrap();

        let err = upload_submission(&f.pool, &f.blobs, f.exam.id, f.exam.questions[0].id, "uid-1", png())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Store(_)));
        assert_eq!(stored_files(f.blobs.root()), 0);
    }

    #[tokio::test]
    async fn test_attendance_follows_completed_reports() {
        let f = fixture().await;
        for email in ["s1@example.org", "s2@example.org"] {
            enrollment::enroll(&f.pool, RosterRef::Class(f.class.id), email)
                .await
                .unwrap();
        }
        let s1 = student_by_uid(&f.pool, "uid-1").await.unwrap();
        let mut report = ExamReport::placeholder(f.exam.id, &s1);
        report.completed = true;
        store::insert(&f.pool, &report).await.unwrap();

        let roll = attendance(&f.pool, f.exam.id).await.unwrap();
        assert_eq!(roll.len(), 2);
        for entry in roll {
            assert_eq!(entry.attended, entry.uid == "uid-1");
        }
    }
}
