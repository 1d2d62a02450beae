//! Response shapes with expanded references
//!
//! Stored documents only hold ids; listings replace student and exam ids
//! with small summaries. Ids whose document has disappeared are dropped.

use chrono::{DateTime, Utc};
use examhub_common::db::models::{Class, Exam, Program, School, Semester, Staff, Student};
use examhub_common::db::store;
use examhub_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct StudentSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SemesterView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub students: Vec<StudentSummary>,
    pub exams: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ProgramView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub semesters: Vec<SemesterView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub programs: Vec<ProgramView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub students: Vec<StudentSummary>,
    pub exams: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    pub start_date: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub uid: String,
    pub email: String,
    pub role: String,
    pub exams: Vec<ExamSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Student lookup table for a batch of views
struct Students(HashMap<Uuid, Student>);

impl Students {
    async fn load(pool: &SqlitePool, ids: Vec<Uuid>) -> Result<Self> {
        let found: Vec<Student> = store::find_by_ids(pool, &ids).await?;
        Ok(Self(found.into_iter().map(|s| (s.id, s)).collect()))
    }

    fn summarize(&self, ids: &[Uuid], with_uid: bool) -> Vec<StudentSummary> {
        ids.iter()
            .filter_map(|id| self.0.get(id))
            .map(|s| StudentSummary {
                id: s.id,
                email: s.email.clone(),
                uid: with_uid.then(|| s.uid.clone()),
            })
            .collect()
    }

    fn semester(&self, semester: &Semester) -> SemesterView {
        SemesterView {
            id: semester.id,
            name: semester.name.clone(),
            students: self.summarize(&semester.students, true),
            exams: semester.exams.clone(),
        }
    }

    fn program(&self, program: &Program) -> ProgramView {
        ProgramView {
            id: program.id,
            name: program.name.clone(),
            semesters: program.semesters.iter().map(|s| self.semester(s)).collect(),
        }
    }

    fn school(&self, school: &School) -> SchoolView {
        SchoolView {
            id: school.id,
            name: school.name.clone(),
            programs: school.programs.iter().map(|p| self.program(p)).collect(),
            created_at: school.created_at,
            updated_at: school.updated_at,
        }
    }

    fn class(&self, class: &Class) -> ClassView {
        ClassView {
            id: class.id,
            name: class.name.clone(),
            students: self.summarize(&class.students, false),
            exams: class.exams.clone(),
            created_at: class.created_at,
            updated_at: class.updated_at,
        }
    }
}

fn school_student_ids(schools: &[School]) -> Vec<Uuid> {
    schools
        .iter()
        .flat_map(|school| school.programs.iter())
        .flat_map(|program| program.semesters.iter())
        .flat_map(|semester| semester.students.iter().copied())
        .collect()
}

pub async fn schools(pool: &SqlitePool, schools: &[School]) -> Result<Vec<SchoolView>> {
    let students = Students::load(pool, school_student_ids(schools)).await?;
    Ok(schools.iter().map(|s| students.school(s)).collect())
}

pub async fn school(pool: &SqlitePool, school: &School) -> Result<SchoolView> {
    let students = Students::load(pool, school_student_ids(std::slice::from_ref(school))).await?;
    Ok(students.school(school))
}

pub async fn program(pool: &SqlitePool, program: &Program) -> Result<ProgramView> {
    let ids = program
        .semesters
        .iter()
        .flat_map(|s| s.students.iter().copied())
        .collect();
    Ok(Students::load(pool, ids).await?.program(program))
}

pub async fn semester(pool: &SqlitePool, semester: &Semester) -> Result<SemesterView> {
    let students = Students::load(pool, semester.students.clone()).await?;
    Ok(students.semester(semester))
}

pub async fn classes(pool: &SqlitePool, classes: &[Class]) -> Result<Vec<ClassView>> {
    let ids = classes
        .iter()
        .flat_map(|c| c.students.iter().copied())
        .collect();
    let students = Students::load(pool, ids).await?;
    Ok(classes.iter().map(|c| students.class(c)).collect())
}

pub async fn class(pool: &SqlitePool, class: &Class) -> Result<ClassView> {
    let students = Students::load(pool, class.students.clone()).await?;
    Ok(students.class(class))
}

pub async fn staff(pool: &SqlitePool, staff: Vec<Staff>) -> Result<Vec<StaffView>> {
    let exams: HashMap<Uuid, Exam> = store::find_all::<Exam>(pool)
        .await?
        .into_iter()
        .map(|e| (e.id, e))
        .collect();

    Ok(staff
        .into_iter()
        .map(|member| StaffView {
            exams: member
                .exams
                .iter()
                .filter_map(|id| exams.get(id))
                .map(|e| ExamSummary {
                    id: e.id,
                    title: e.title.clone(),
                    start_date: e.start_date,
                })
                .collect(),
            id: member.id,
            uid: member.uid,
            email: member.email,
            role: member.role,
            created_at: member.created_at,
            updated_at: member.updated_at,
        })
        .collect())
}
