//! Reference resolver
//!
//! Materializes the roster an id points at. Classes are top-level documents;
//! semesters live inside a school document and are located by searching
//! every program of every school.

use examhub_common::db::models::{Class, RosterRef, School, Semester};
use examhub_common::db::{schools, store};
use examhub_common::{Error, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

/// A semester together with the school document that owns it
#[derive(Debug, Clone)]
pub struct SemesterLocation {
    pub school: School,
    pub program_index: usize,
    pub semester_index: usize,
}

impl SemesterLocation {
    pub fn semester(&self) -> &Semester {
        &self.school.programs[self.program_index].semesters[self.semester_index]
    }

    pub fn semester_mut(&mut self) -> &mut Semester {
        &mut self.school.programs[self.program_index].semesters[self.semester_index]
    }
}

/// Find the school, program and position of a semester from its id alone
pub async fn locate_semester(
    pool: &SqlitePool,
    semester_id: Uuid,
) -> Result<Option<SemesterLocation>> {
    let Some(school) = schools::find_by_semester(pool, semester_id).await? else {
        return Ok(None);
    };

    Ok(school
        .semester_position(semester_id)
        .map(|(program_index, semester_index)| SemesterLocation {
            school,
            program_index,
            semester_index,
        }))
}

/// Resolve a fully spelled-out school / program / semester path
pub async fn locate_semester_in(
    pool: &SqlitePool,
    school_id: Uuid,
    program_id: Uuid,
    semester_id: Uuid,
) -> Result<SemesterLocation> {
    let school: School = store::get(pool, school_id).await?;
    let program_index = school
        .program_index(program_id)
        .ok_or_else(|| Error::NotFound("Program not found".to_string()))?;
    let semester_index = school.programs[program_index]
        .semester_index(semester_id)
        .ok_or_else(|| Error::NotFound("Semester not found".to_string()))?;

    Ok(SemesterLocation {
        school,
        program_index,
        semester_index,
    })
}

/// A materialized roster of either model
#[derive(Debug, Clone)]
pub enum Roster {
    Class(Class),
    Semester(SemesterLocation),
}

impl Roster {
    /// Resolve a roster reference; absence is `None`, never an error
    pub async fn resolve(pool: &SqlitePool, target: RosterRef) -> Result<Option<Roster>> {
        match target {
            RosterRef::Class(id) => Ok(store::find_by_id::<Class>(pool, id).await?.map(Roster::Class)),
            RosterRef::Semester(id) => Ok(locate_semester(pool, id).await?.map(Roster::Semester)),
        }
    }

    /// Like [`Roster::resolve`] with absence reported as `NotFound`
    pub async fn get(pool: &SqlitePool, target: RosterRef) -> Result<Roster> {
        Self::resolve(pool, target)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{} not found", target.label())))
    }

    pub fn roster_ref(&self) -> RosterRef {
        match self {
            Roster::Class(class) => RosterRef::Class(class.id),
            Roster::Semester(location) => RosterRef::Semester(location.semester().id),
        }
    }

    /// "class" or "semester", for messages
    pub fn noun(&self) -> &'static str {
        match self {
            Roster::Class(_) => "class",
            Roster::Semester(_) => "semester",
        }
    }

    pub fn students(&self) -> &[Uuid] {
        match self {
            Roster::Class(class) => &class.students,
            Roster::Semester(location) => &location.semester().students,
        }
    }

    pub fn students_mut(&mut self) -> &mut Vec<Uuid> {
        match self {
            Roster::Class(class) => &mut class.students,
            Roster::Semester(location) => &mut location.semester_mut().students,
        }
    }

    pub fn exams(&self) -> &[Uuid] {
        match self {
            Roster::Class(class) => &class.exams,
            Roster::Semester(location) => &location.semester().exams,
        }
    }

    pub fn exams_mut(&mut self) -> &mut Vec<Uuid> {
        match self {
            Roster::Class(class) => &mut class.exams,
            Roster::Semester(location) => &mut location.semester_mut().exams,
        }
    }

    /// Persist the owning document (the class, or the whole school)
    pub async fn save(&mut self, pool: &SqlitePool) -> Result<()> {
        match self {
            Roster::Class(class) => store::replace(pool, class).await,
            Roster::Semester(location) => store::replace(pool, &mut location.school).await,
        }
    }
}
