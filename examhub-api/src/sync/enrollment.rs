//! Roster enrollment
//!
//! A roster's students and every student's exam set mirror each other:
//! joining a roster grants its exams, leaving it revokes them.

use examhub_common::db::accounts::{self, normalize_email};
use examhub_common::db::models::{RosterRef, Student};
use examhub_common::db::{refs, store};
use examhub_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use super::resolver::Roster;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrolled {
    pub email: String,
    pub student_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryError {
    pub email: String,
    pub error: String,
}

/// Per-entry outcome of a bulk enrollment
#[derive(Debug, Default, Serialize)]
pub struct BulkOutcome {
    pub created: Vec<Enrolled>,
    pub errors: Vec<EntryError>,
}

async fn find_student(pool: &SqlitePool, email: &str) -> Result<Student> {
    if email.trim().is_empty() {
        return Err(Error::Validation("Valid student email is required".to_string()));
    }
    accounts::find_by_email::<Student>(pool, email)
        .await?
        .ok_or_else(|| Error::NotFound("Student not found".to_string()))
}

/// Add the student to the in-memory roster and grant its exams
///
/// Returns the student with an updated (unsaved) exam set.
async fn admit(pool: &SqlitePool, roster: &mut Roster, email: &str) -> Result<Student> {
    let mut student = find_student(pool, email).await?;

    if refs::contains(roster.students(), student.id) {
        return Err(Error::Conflict(format!(
            "Student already enrolled in this {}",
            roster.noun()
        )));
    }

    refs::union_insert(roster.students_mut(), student.id);
    refs::union_all(&mut student.exams, roster.exams());
    Ok(student)
}

/// Enroll one student; the roster is written before the student
pub async fn add_student(pool: &SqlitePool, roster: &mut Roster, email: &str) -> Result<Student> {
    let mut student = admit(pool, roster, email).await?;

    roster.save(pool).await?;
    store::replace(pool, &mut student).await?;

    info!(
        "Enrolled {} in {} {} ({} exam(s) granted)",
        student.email,
        roster.noun(),
        roster.roster_ref().id(),
        roster.exams().len()
    );
    Ok(student)
}

/// Resolve the roster, then enroll
pub async fn enroll(pool: &SqlitePool, target: RosterRef, email: &str) -> Result<(Roster, Student)> {
    let mut roster = Roster::get(pool, target).await?;
    let student = add_student(pool, &mut roster, email).await?;
    Ok((roster, student))
}

/// Enroll many students; a failing entry never stops the batch
///
/// Students are written as they are processed, the roster once at the end.
pub async fn bulk_add(pool: &SqlitePool, roster: &mut Roster, emails: &[String]) -> Result<BulkOutcome> {
    let mut outcome = BulkOutcome::default();

    for email in emails {
        let result = async {
            let mut student = admit(pool, roster, email).await?;
            if let Err(e) = store::replace(pool, &mut student).await {
                refs::pull(roster.students_mut(), student.id);
                return Err(e);
            }
            Ok(student)
        }
        .await;

        match result {
            Ok(student) => outcome.created.push(Enrolled {
                email: student.email,
                student_id: student.id,
            }),
            Err(e) => {
                warn!("Skipping {} in bulk enrollment: {}", email, e);
                outcome.errors.push(EntryError {
                    email: email.clone(),
                    error: e.message(),
                });
            }
        }
    }

    if !outcome.created.is_empty() {
        roster.save(pool).await?;
    }

    info!(
        "Bulk enrollment into {} {}: {} added, {} failed",
        roster.noun(),
        roster.roster_ref().id(),
        outcome.created.len(),
        outcome.errors.len()
    );
    Ok(outcome)
}

/// Remove a student and revoke every exam of the roster
///
/// Revocation is unconditional: an exam the student also holds through
/// another roster is pulled as well.
pub async fn remove_student(pool: &SqlitePool, roster: &mut Roster, email: &str) -> Result<Student> {
    let mut student = find_student(pool, email).await?;

    if !refs::pull(roster.students_mut(), student.id) {
        return Err(Error::NotFound(format!(
            "Student not enrolled in this {}",
            roster.noun()
        )));
    }
    roster.save(pool).await?;

    if refs::pull_all(&mut student.exams, roster.exams()) {
        store::replace(pool, &mut student).await?;
    }

    info!(
        "Removed {} from {} {}",
        normalize_email(email),
        roster.noun(),
        roster.roster_ref().id()
    );
    Ok(student)
}

#[cfg(test)]
mod tests {
    use super::*;
    use examhub_common::db::init_memory_database;
    use examhub_common::db::models::{Class, Program, School, Semester};

    async fn student(pool: &SqlitePool, email: &str) -> Student {
        let student = Student::new(format!("uid-{}", email), email.to_string());
        store::insert(pool, &student).await.unwrap();
        student
    }

    async fn class_with_exams(pool: &SqlitePool, exams: &[Uuid]) -> Class {
        let mut class = Class::new("Chemistry".into());
        class.exams = exams.to_vec();
        store::insert(pool, &class).await.unwrap();
        class
    }

    #[tokio::test]
    async fn test_enrollment_grants_roster_exams() {
        let pool = init_memory_database().await.unwrap();
        let (e1, e2, own) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let class = class_with_exams(&pool, &[e1, e2]).await;
        let mut existing = student(&pool, "a@example.org").await;
        existing.exams.push(own);
        store::replace(&pool, &mut existing).await.unwrap();

        let (roster, enrolled) = enroll(&pool, RosterRef::Class(class.id), "A@Example.org")
            .await
            .unwrap();

        assert_eq!(roster.students(), &[enrolled.id]);
        let stored: Student = store::get(&pool, enrolled.id).await.unwrap();
        assert_eq!(stored.exams, vec![own, e1, e2]);
    }

    #[tokio::test]
    async fn test_second_enrollment_conflicts() {
        let pool = init_memory_database().await.unwrap();
        let class = class_with_exams(&pool, &[]).await;
        student(&pool, "b@example.org").await;

        enroll(&pool, RosterRef::Class(class.id), "b@example.org").await.unwrap();
        let err = enroll(&pool, RosterRef::Class(class.id), "b@example.org")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Conflict(_)));
        let stored: Class = store::get(&pool, class.id).await.unwrap();
        assert_eq!(stored.students.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_student_or_roster_is_not_found() {
        let pool = init_memory_database().await.unwrap();
        let class = class_with_exams(&pool, &[]).await;

        let err = enroll(&pool, RosterRef::Class(class.id), "ghost@example.org")
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Student not found");

        student(&pool, "c@example.org").await;
        let err = enroll(&pool, RosterRef::Class(Uuid::new_v4()), "c@example.org")
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Class not found");
    }

    #[tokio::test]
    async fn test_bulk_add_collects_per_entry_results() {
        let pool = init_memory_database().await.unwrap();
        let exam = Uuid::new_v4();
        let class = class_with_exams(&pool, &[exam]).await;
        let first = student(&pool, "one@example.org").await;
        let second = student(&pool, "two@example.org").await;

        let mut roster = Roster::get(&pool, RosterRef::Class(class.id)).await.unwrap();
        let emails = vec![
            "one@example.org".to_string(),
            "missing@example.org".to_string(),
            "ONE@example.org".to_string(),
            "two@example.org".to_string(),
        ];
        let outcome = bulk_add(&pool, &mut roster, &emails).await.unwrap();

        assert_eq!(outcome.created.len(), 2);
        assert_eq!(outcome.errors.len(), 2);
        assert_eq!(outcome.errors[0].error, "Student not found");
        assert!(outcome.errors[1].error.starts_with("Student already enrolled"));

        let stored: Class = store::get(&pool, class.id).await.unwrap();
        assert_eq!(stored.students, vec![first.id, second.id]);
        for id in [first.id, second.id] {
            let s: Student = store::get(&pool, id).await.unwrap();
            assert_eq!(s.exams, vec![exam]);
        }
    }

    #[tokio::test]
    async fn test_removal_pulls_roster_exams_unconditionally() {
        let pool = init_memory_database().await.unwrap();
        let shared = Uuid::new_v4();

        // The same exam id reaches the student through two rosters
        let mut school = School::new("Law".into());
        let mut program = Program::new("LLB".into());
        let mut semester = Semester::new("Year 1".into());
        semester.exams.push(shared);
        let semester_id = semester.id;
        program.semesters.push(semester);
        school.programs.push(program);
        store::insert(&pool, &school).await.unwrap();
        let class = class_with_exams(&pool, &[shared]).await;

        let s = student(&pool, "d@example.org").await;
        enroll(&pool, RosterRef::Semester(semester_id), "d@example.org").await.unwrap();
        enroll(&pool, RosterRef::Class(class.id), "d@example.org").await.unwrap();

        let mut roster = Roster::get(&pool, RosterRef::Class(class.id)).await.unwrap();
        remove_student(&pool, &mut roster, "d@example.org").await.unwrap();

        let stored: Student = store::get(&pool, s.id).await.unwrap();
        assert!(stored.exams.is_empty());
        let stored_class: Class = store::get(&pool, class.id).await.unwrap();
        assert!(stored_class.students.is_empty());
    }

    #[tokio::test]
    async fn test_removing_non_member_is_not_found() {
        let pool = init_memory_database().await.unwrap();
        let class = class_with_exams(&pool, &[]).await;
        student(&pool, "e@example.org").await;

        let mut roster = Roster::get(&pool, RosterRef::Class(class.id)).await.unwrap();
        let err = remove_student(&pool, &mut roster, "e@example.org")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
