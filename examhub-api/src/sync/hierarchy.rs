//! School / program / semester and class administration
//!
//! Removing a roster node first revokes its exams from its students. The
//! exams themselves, and their submissions and reports, are kept.

use examhub_common::db::accounts;
use examhub_common::db::models::{Class, Program, School, Semester, Student};
use examhub_common::db::{schools, store};
use examhub_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use super::resolver::locate_semester_in;

fn required_name(name: &str, what: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation(format!("Valid {} name is required", what)));
    }
    Ok(name.to_string())
}

/// Case-insensitive clash among siblings, ignoring the node being renamed
fn clashes<'a>(
    mut siblings: impl Iterator<Item = (Uuid, &'a str)>,
    name: &str,
    except: Option<Uuid>,
) -> bool {
    let wanted = name.to_lowercase();
    siblings.any(|(id, existing)| Some(id) != except && existing.to_lowercase() == wanted)
}

fn program_mut(school: &mut School, program_id: Uuid) -> Result<&mut Program> {
    school
        .programs
        .iter_mut()
        .find(|p| p.id == program_id)
        .ok_or_else(|| Error::NotFound("Program not found".to_string()))
}

/// Revoke a semester's exams from its enrolled students
async fn revoke_semester(pool: &SqlitePool, semester: &Semester) -> Result<usize> {
    accounts::pull_exams::<Student>(pool, &semester.students, &semester.exams).await
}

// ============================================================================
// Schools
// ============================================================================

pub async fn create_school(pool: &SqlitePool, name: &str) -> Result<School> {
    let name = required_name(name, "school")?;
    if schools::find_by_name(pool, &name).await?.is_some() {
        return Err(Error::Conflict("School with this name already exists".to_string()));
    }

    let school = School::new(name);
    store::insert(pool, &school).await?;
    info!("Created school {} '{}'", school.id, school.name);
    Ok(school)
}

pub async fn rename_school(pool: &SqlitePool, school_id: Uuid, name: &str) -> Result<School> {
    let name = required_name(name, "school")?;
    let mut school: School = store::get(pool, school_id).await?;

    if let Some(existing) = schools::find_by_name(pool, &name).await? {
        if existing.id != school_id {
            return Err(Error::Conflict("School with this name already exists".to_string()));
        }
    }

    school.name = name;
    store::replace(pool, &mut school).await?;
    Ok(school)
}

pub async fn delete_school(pool: &SqlitePool, school_id: Uuid) -> Result<()> {
    let school: School = store::get(pool, school_id).await?;

    let mut revoked = 0;
    for semester in school.programs.iter().flat_map(|p| p.semesters.iter()) {
        revoked += revoke_semester(pool, semester).await?;
    }
    store::delete::<School>(pool, school_id).await?;

    info!(
        "Deleted school {} '{}' ({} student record(s) updated)",
        school.id, school.name, revoked
    );
    Ok(())
}

// ============================================================================
// Programs
// ============================================================================

pub async fn add_program(pool: &SqlitePool, school_id: Uuid, name: &str) -> Result<School> {
    let name = required_name(name, "program")?;
    let mut school: School = store::get(pool, school_id).await?;

    if clashes(school.programs.iter().map(|p| (p.id, p.name.as_str())), &name, None) {
        return Err(Error::Conflict(
            "Program with this name already exists in this school".to_string(),
        ));
    }

    let program = Program::new(name);
    info!("Added program {} '{}' to school {}", program.id, program.name, school_id);
    school.programs.push(program);
    store::replace(pool, &mut school).await?;
    Ok(school)
}

pub async fn rename_program(
    pool: &SqlitePool,
    school_id: Uuid,
    program_id: Uuid,
    name: &str,
) -> Result<School> {
    let name = required_name(name, "program")?;
    let mut school: School = store::get(pool, school_id).await?;

    if clashes(
        school.programs.iter().map(|p| (p.id, p.name.as_str())),
        &name,
        Some(program_id),
    ) {
        return Err(Error::Conflict(
            "Program with this name already exists in this school".to_string(),
        ));
    }

    program_mut(&mut school, program_id)?.name = name;
    store::replace(pool, &mut school).await?;
    Ok(school)
}

pub async fn delete_program(pool: &SqlitePool, school_id: Uuid, program_id: Uuid) -> Result<School> {
    let mut school: School = store::get(pool, school_id).await?;
    let index = school
        .program_index(program_id)
        .ok_or_else(|| Error::NotFound("Program not found".to_string()))?;

    let mut revoked = 0;
    for semester in &school.programs[index].semesters {
        revoked += revoke_semester(pool, semester).await?;
    }

    let program = school.programs.remove(index);
    store::replace(pool, &mut school).await?;

    info!(
        "Deleted program {} '{}' from school {} ({} student record(s) updated)",
        program.id, program.name, school_id, revoked
    );
    Ok(school)
}

// ============================================================================
// Semesters
// ============================================================================

pub async fn add_semester(
    pool: &SqlitePool,
    school_id: Uuid,
    program_id: Uuid,
    name: &str,
) -> Result<School> {
    let name = required_name(name, "semester")?;
    let mut school: School = store::get(pool, school_id).await?;
    let program = program_mut(&mut school, program_id)?;

    if clashes(program.semesters.iter().map(|s| (s.id, s.name.as_str())), &name, None) {
        return Err(Error::Conflict(
            "Semester with this name already exists in this program".to_string(),
        ));
    }

    let semester = Semester::new(name);
    info!("Added semester {} '{}' to program {}", semester.id, semester.name, program_id);
    program.semesters.push(semester);
    store::replace(pool, &mut school).await?;
    Ok(school)
}

pub async fn rename_semester(
    pool: &SqlitePool,
    school_id: Uuid,
    program_id: Uuid,
    semester_id: Uuid,
    name: &str,
) -> Result<School> {
    let name = required_name(name, "semester")?;
    let mut location = locate_semester_in(pool, school_id, program_id, semester_id).await?;
    let program = &location.school.programs[location.program_index];

    if clashes(
        program.semesters.iter().map(|s| (s.id, s.name.as_str())),
        &name,
        Some(semester_id),
    ) {
        return Err(Error::Conflict(
            "Semester with this name already exists in this program".to_string(),
        ));
    }

    location.semester_mut().name = name;
    store::replace(pool, &mut location.school).await?;
    Ok(location.school)
}

pub async fn delete_semester(
    pool: &SqlitePool,
    school_id: Uuid,
    program_id: Uuid,
    semester_id: Uuid,
) -> Result<School> {
    let mut location = locate_semester_in(pool, school_id, program_id, semester_id).await?;
    let revoked = revoke_semester(pool, location.semester()).await?;

    let semester = location.school.programs[location.program_index]
        .semesters
        .remove(location.semester_index);
    store::replace(pool, &mut location.school).await?;

    info!(
        "Deleted semester {} '{}' ({} student record(s) updated)",
        semester.id, semester.name, revoked
    );
    Ok(location.school)
}

// ============================================================================
// Classes
// ============================================================================

pub async fn create_class(pool: &SqlitePool, name: &str) -> Result<Class> {
    let class = Class::new(required_name(name, "class")?);
    store::insert(pool, &class).await?;
    info!("Created class {} '{}'", class.id, class.name);
    Ok(class)
}

pub async fn rename_class(pool: &SqlitePool, class_id: Uuid, name: &str) -> Result<Class> {
    let name = required_name(name, "class")?;
    let mut class: Class = store::get(pool, class_id).await?;
    class.name = name;
    store::replace(pool, &mut class).await?;
    Ok(class)
}

pub async fn delete_class(pool: &SqlitePool, class_id: Uuid) -> Result<()> {
    let class: Class = store::get(pool, class_id).await?;
    let revoked = accounts::pull_exams::<Student>(pool, &class.students, &class.exams).await?;
    store::delete::<Class>(pool, class_id).await?;

    info!(
        "Deleted class {} '{}' ({} student record(s) updated)",
        class.id, class.name, revoked
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::enrollment;
    use chrono::{Duration, Utc};
    use examhub_common::db::init_memory_database;
    use examhub_common::db::models::{Exam, ExamReport, RosterRef, Submission};
    use examhub_common::db::{reports, submissions};

    async fn student(pool: &SqlitePool, email: &str) -> Student {
        let student = Student::new(format!("uid-{}", email), email.to_string());
        store::insert(pool, &student).await.unwrap();
        student
    }

    /// School with one program and one semester holding `exams`
    async fn school_with_semester(pool: &SqlitePool, exams: &[Uuid]) -> (Uuid, Uuid, Uuid) {
        let school = create_school(pool, "Engineering").await.unwrap();
        let school = add_program(pool, school.id, "Civil").await.unwrap();
        let program_id = school.programs[0].id;
        let mut school = add_semester(pool, school.id, program_id, "Term 1").await.unwrap();
        let semester_id = school.programs[0].semesters[0].id;
        school.programs[0].semesters[0].exams = exams.to_vec();
        store::replace(pool, &mut school).await.unwrap();
        (school.id, program_id, semester_id)
    }

    #[tokio::test]
    async fn test_school_names_are_trimmed_and_unique() {
        let pool = init_memory_database().await.unwrap();

        let school = create_school(&pool, "  Arts ").await.unwrap();
        assert_eq!(school.name, "Arts");

        let err = create_school(&pool, "Arts").await.unwrap_err();
        assert_eq!(err.message(), "School with this name already exists");
        let err = create_school(&pool, "   ").await.unwrap_err();
        assert_eq!(err.message(), "Valid school name is required");

        // Renaming to its own name is not a clash
        assert!(rename_school(&pool, school.id, "Arts").await.is_ok());
        create_school(&pool, "Music").await.unwrap();
        assert!(matches!(
            rename_school(&pool, school.id, "Music").await,
            Err(Error::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_program_and_semester_names_clash_case_insensitively() {
        let pool = init_memory_database().await.unwrap();
        let (school_id, program_id, semester_id) = school_with_semester(&pool, &[]).await;

        assert!(matches!(
            add_program(&pool, school_id, "CIVIL").await,
            Err(Error::Conflict(_))
        ));
        assert!(matches!(
            add_semester(&pool, school_id, program_id, "term 1").await,
            Err(Error::Conflict(_))
        ));

        let school = rename_semester(&pool, school_id, program_id, semester_id, "Term One")
            .await
            .unwrap();
        assert_eq!(school.programs[0].semesters[0].name, "Term One");

        let err = add_semester(&pool, school_id, Uuid::new_v4(), "Term 2")
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Program not found");
    }

    /// Exam owned by the semester with one submission and one report from `student`
    async fn exam_with_history(pool: &SqlitePool, exam_id: Uuid, semester_id: Uuid, student: &Student) {
        let now = Utc::now();
        let exam = Exam {
            id: exam_id,
            title: "Statics".to_string(),
            description: None,
            owner: RosterRef::Semester(semester_id),
            start_date: now,
            end_date: now + Duration::hours(2),
            duration: 90,
            upload_duration: None,
            questions: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        store::insert(pool, &exam).await.unwrap();

        let submission = Submission {
            id: Uuid::new_v4(),
            exam_id,
            question_id: Uuid::new_v4(),
            uid: student.uid.clone(),
            student_id: student.id,
            file_url: "http://localhost/files/working.pdf".to_string(),
            timestamp: now,
        };
        store::insert(pool, &submission).await.unwrap();
        store::insert(pool, &ExamReport::placeholder(exam_id, student)).await.unwrap();
    }

    async fn assert_history_kept(pool: &SqlitePool, exam_id: Uuid) {
        assert!(store::find_by_id::<Exam>(pool, exam_id).await.unwrap().is_some());
        assert_eq!(submissions::for_exam(pool, exam_id).await.unwrap().len(), 1);
        assert_eq!(reports::for_exam(pool, exam_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_semester_delete_revokes_exams_but_keeps_them() {
        let pool = init_memory_database().await.unwrap();
        let exam_id = Uuid::new_v4();
        let (school_id, program_id, semester_id) = school_with_semester(&pool, &[exam_id]).await;
        let a = student(&pool, "a@example.org").await;
        exam_with_history(&pool, exam_id, semester_id, &a).await;
        enrollment::enroll(&pool, RosterRef::Semester(semester_id), "a@example.org")
            .await
            .unwrap();

        let school = delete_semester(&pool, school_id, program_id, semester_id)
            .await
            .unwrap();

        assert!(school.programs[0].semesters.is_empty());
        let a: Student = store::get(&pool, a.id).await.unwrap();
        assert!(a.exams.is_empty());
        assert_history_kept(&pool, exam_id).await;
    }

    #[tokio::test]
    async fn test_program_delete_revokes_every_semester_but_keeps_exams() {
        let pool = init_memory_database().await.unwrap();
        let exam_id = Uuid::new_v4();
        let (school_id, program_id, semester_id) = school_with_semester(&pool, &[exam_id]).await;
        let a = student(&pool, "a@example.org").await;
        exam_with_history(&pool, exam_id, semester_id, &a).await;
        enrollment::enroll(&pool, RosterRef::Semester(semester_id), "a@example.org")
            .await
            .unwrap();
        let enrolled: Student = store::get(&pool, a.id).await.unwrap();
        assert_eq!(enrolled.exams, vec![exam_id]);

        let school = delete_program(&pool, school_id, program_id).await.unwrap();

        assert!(school.programs.is_empty());
        let a: Student = store::get(&pool, a.id).await.unwrap();
        assert!(a.exams.is_empty());
        assert_history_kept(&pool, exam_id).await;
    }

    #[tokio::test]
    async fn test_school_delete_revokes_and_removes() {
        let pool = init_memory_database().await.unwrap();
        let exam_id = Uuid::new_v4();
        let (school_id, _, semester_id) = school_with_semester(&pool, &[exam_id]).await;
        let a = student(&pool, "a@example.org").await;
        exam_with_history(&pool, exam_id, semester_id, &a).await;
        enrollment::enroll(&pool, RosterRef::Semester(semester_id), "a@example.org")
            .await
            .unwrap();

        delete_school(&pool, school_id).await.unwrap();

        assert!(store::find_by_id::<School>(&pool, school_id).await.unwrap().is_none());
        let a: Student = store::get(&pool, a.id).await.unwrap();
        assert!(a.exams.is_empty());
        assert_history_kept(&pool, exam_id).await;
    }

    #[tokio::test]
    async fn test_class_lifecycle() {
        let pool = init_memory_database().await.unwrap();
        assert!(matches!(create_class(&pool, "").await, Err(Error::Validation(_))));

        let class = create_class(&pool, "Biology").await.unwrap();
        let renamed = rename_class(&pool, class.id, "Biology II").await.unwrap();
        assert_eq!(renamed.name, "Biology II");

        let exam_id = Uuid::new_v4();
        let mut stored: Class = store::get(&pool, class.id).await.unwrap();
        stored.exams.push(exam_id);
        store::replace(&pool, &mut stored).await.unwrap();
        let b = student(&pool, "b@example.org").await;
        enrollment::enroll(&pool, RosterRef::Class(class.id), "b@example.org")
            .await
            .unwrap();

        delete_class(&pool, class.id).await.unwrap();

        let b: Student = store::get(&pool, b.id).await.unwrap();
        assert!(b.exams.is_empty());
        assert!(matches!(
            delete_class(&pool, class.id).await,
            Err(Error::NotFound(_))
        ));
    }
}
