//! Exam lifecycle fan-out
//!
//! An exam id is mirrored into its owner's exam set, into every student of
//! the owner's roster and into every staff record. Each touched document is
//! written individually; a failure part-way leaves earlier writes in place.

use chrono::{DateTime, Utc};
use examhub_common::db::accounts;
use examhub_common::db::models::{Exam, Question, RosterRef, Staff, Student};
use examhub_common::db::{refs, reports, store, submissions};
use examhub_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use super::questions;
use super::resolver::Roster;
use crate::storage::{self, BlobStore};

/// Validated-on-use exam fields supplied by a client
#[derive(Debug, Clone)]
pub struct ExamDraft {
    pub title: String,
    pub description: Option<String>,
    pub owner: RosterRef,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub duration: u32,
    pub upload_duration: Option<u32>,
    pub questions: Vec<Question>,
}

impl ExamDraft {
    pub fn validate(&mut self) -> Result<()> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            return Err(Error::Validation("Exam title is required".to_string()));
        }
        if self.duration < 1 {
            return Err(Error::Validation(
                "Duration must be at least 1 minute".to_string(),
            ));
        }
        if self.end_date < self.start_date {
            return Err(Error::Validation(
                "End date must not precede start date".to_string(),
            ));
        }
        questions::validate_questions(&mut self.questions)
    }

    fn apply_to(self, exam: &mut Exam) {
        exam.title = self.title;
        exam.description = self.description;
        exam.owner = self.owner;
        exam.start_date = self.start_date;
        exam.end_date = self.end_date;
        exam.duration = self.duration;
        exam.upload_duration = self.upload_duration;
        exam.questions = self.questions;
    }
}

/// Union the exam into the roster's exam set and into each of its students
async fn attach_to_roster(pool: &SqlitePool, roster: &mut Roster, exam_id: Uuid) -> Result<()> {
    if refs::union_insert(roster.exams_mut(), exam_id) {
        roster.save(pool).await?;
    }
    let granted = accounts::add_exams::<Student>(pool, roster.students(), &[exam_id]).await?;

    debug!(
        "Exam {} attached to {} {} ({} student record(s) updated)",
        exam_id,
        roster.noun(),
        roster.roster_ref().id(),
        granted
    );
    Ok(())
}

/// Pull the exam from the roster's exam set and from each of its students
async fn detach_from_roster(pool: &SqlitePool, roster: &mut Roster, exam_id: Uuid) -> Result<()> {
    if refs::pull(roster.exams_mut(), exam_id) {
        roster.save(pool).await?;
    }
    let revoked = accounts::pull_exams::<Student>(pool, roster.students(), &[exam_id]).await?;

    debug!(
        "Exam {} detached from {} {} ({} student record(s) updated)",
        exam_id,
        roster.noun(),
        roster.roster_ref().id(),
        revoked
    );
    Ok(())
}

/// Staff see every exam
pub async fn broadcast_to_staff(pool: &SqlitePool, exam_id: Uuid) -> Result<usize> {
    let updated = accounts::broadcast_exam::<Staff>(pool, exam_id).await?;
    debug!("Exam {} broadcast to {} staff record(s)", exam_id, updated);
    Ok(updated)
}

/// Persist a new exam and fan its id out to owner, roster and staff
pub async fn create_exam(pool: &SqlitePool, mut draft: ExamDraft) -> Result<Exam> {
    draft.validate()?;

    // Resolve the owner up front so a bad owner never leaves an orphan exam
    let mut roster = Roster::get(pool, draft.owner).await?;

    let now = Utc::now();
    let mut exam = Exam {
        id: Uuid::new_v4(),
        title: String::new(),
        description: None,
        owner: draft.owner,
        start_date: draft.start_date,
        end_date: draft.end_date,
        duration: draft.duration,
        upload_duration: None,
        questions: Vec::new(),
        created_at: now,
        updated_at: now,
    };
    draft.apply_to(&mut exam);
    store::insert(pool, &exam).await?;

    attach_to_roster(pool, &mut roster, exam.id).await?;
    broadcast_to_staff(pool, exam.id).await?;

    info!(
        "Created exam {} '{}' for {} {}",
        exam.id,
        exam.title,
        roster.noun(),
        exam.owner.id()
    );
    Ok(exam)
}

/// Update exam fields and repair or move its references
///
/// Question files dropped by the update are deleted after the exam is
/// persisted; deletion failures are only logged.
pub async fn update_exam(
    pool: &SqlitePool,
    blobs: &dyn BlobStore,
    exam_id: Uuid,
    mut draft: ExamDraft,
) -> Result<Exam> {
    let mut exam: Exam = store::get(pool, exam_id).await?;
    draft.validate()?;

    let referenced = submissions::referenced_questions(pool, exam_id).await?;
    questions::check_referenced_unchanged(&exam, &draft.questions, &referenced)?;

    // Fails with NotFound before anything is written
    let mut new_roster = Roster::get(pool, draft.owner).await?;

    let old_owner = exam.owner;
    let stale_files = questions::removed_file_urls(&exam, &draft.questions);
    draft.apply_to(&mut exam);
    store::replace(pool, &mut exam).await?;

    if old_owner == exam.owner {
        attach_to_roster(pool, &mut new_roster, exam_id).await?;
        broadcast_to_staff(pool, exam_id).await?;
    } else {
        if let Some(mut old_roster) = Roster::resolve(pool, old_owner).await? {
            detach_from_roster(pool, &mut old_roster, exam_id).await?;
        }
        // Reload: both semesters may live in the same school document
        new_roster = Roster::get(pool, exam.owner).await?;
        attach_to_roster(pool, &mut new_roster, exam_id).await?;
        info!(
            "Moved exam {} from {} {} to {} {}",
            exam_id,
            old_owner.label(),
            old_owner.id(),
            exam.owner.label(),
            exam.owner.id()
        );
    }

    storage::delete_quietly(blobs, &stale_files).await;

    info!("Updated exam {} '{}'", exam.id, exam.title);
    Ok(exam)
}

/// Remove every reference to the exam, its attempts, then the exam itself
pub async fn delete_exam(pool: &SqlitePool, exam_id: Uuid) -> Result<()> {
    let exam: Exam = store::get(pool, exam_id).await?;

    if let Some(mut roster) = Roster::resolve(pool, exam.owner).await? {
        if refs::pull(roster.exams_mut(), exam_id) {
            roster.save(pool).await?;
        }
    }

    let students = accounts::pull_exam_everywhere::<Student>(pool, exam_id).await?;
    let staff = accounts::pull_exam_everywhere::<Staff>(pool, exam_id).await?;
    let removed_submissions = submissions::delete_for_exam(pool, exam_id).await?;
    let removed_reports = reports::delete_for_exam(pool, exam_id).await?;

    store::delete::<Exam>(pool, exam_id).await?;

    info!(
        "Deleted exam {} ({} student, {} staff references; {} submissions, {} reports)",
        exam_id, students, staff, removed_submissions, removed_reports
    );
    Ok(())
}
