//! In-progress answer snapshots

use chrono::Utc;
use examhub_common::db::answers;
use examhub_common::db::models::{Exam, SavedAnswer, Snapshot, Student};
use examhub_common::db::store;
use examhub_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use super::student_by_uid;

async fn enrolled(pool: &SqlitePool, exam_id: Uuid, uid: &str) -> Result<(Student, Exam)> {
    let student = student_by_uid(pool, uid).await?;
    let exam: Exam = store::get(pool, exam_id).await?;

    if !student.has_exam(exam_id) {
        return Err(Error::InvalidReference(
            "Student not enrolled in this exam".to_string(),
        ));
    }
    Ok((student, exam))
}

fn check_question_keys(exam: &Exam, snapshot: &Snapshot, what: &str) -> Result<()> {
    for key in snapshot.keys() {
        let known = Uuid::parse_str(key)
            .ok()
            .is_some_and(|id| exam.question(id).is_some());
        if !known {
            return Err(Error::InvalidReference(format!("Invalid question ID{}: {}", what, key)));
        }
    }
    Ok(())
}

/// Replace the saved snapshot for (exam, uid)
pub async fn save_answers(
    pool: &SqlitePool,
    exam_id: Uuid,
    uid: &str,
    user_answers: Snapshot,
    uploaded_file_urls: Snapshot,
) -> Result<SavedAnswer> {
    let (_, exam) = enrolled(pool, exam_id, uid).await?;
    check_question_keys(&exam, &user_answers, "")?;
    check_question_keys(&exam, &uploaded_file_urls, " for file URL")?;

    let saved = answers::upsert(
        pool,
        SavedAnswer {
            id: Uuid::new_v4(),
            exam_id,
            uid: uid.to_string(),
            user_answers,
            uploaded_file_urls,
            updated_at: Utc::now(),
        },
    )
    .await?;

    debug!("Saved answers for exam {} by {}", exam_id, uid);
    Ok(saved)
}

/// Saved (answers, file URLs); both empty when nothing was saved yet
pub async fn saved_answers(pool: &SqlitePool, exam_id: Uuid, uid: &str) -> Result<(Snapshot, Snapshot)> {
    enrolled(pool, exam_id, uid).await?;

    Ok(match answers::find(pool, exam_id, uid).await? {
        Some(saved) => (saved.user_answers, saved.uploaded_file_urls),
        None => (Snapshot::new(), Snapshot::new()),
    })
}
