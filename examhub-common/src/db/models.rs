//! Entity models
//!
//! Documents serialize with Mongo-style `_id` keys and camelCase field names
//! so the stored form and the HTTP form are the same JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::refs::contains;

/// Free-form JSON object keyed by question id
pub type Snapshot = Map<String, Value>;

fn new_id() -> Uuid {
    Uuid::new_v4()
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

// ============================================================================
// School -> Program -> Semester
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct School {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub programs: Vec<Program>,
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "now")]
    pub updated_at: DateTime<Utc>,
}

impl School {
    pub fn new(name: String) -> Self {
        let at = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            programs: Vec::new(),
            created_at: at,
            updated_at: at,
        }
    }

    pub fn program(&self, program_id: Uuid) -> Option<&Program> {
        self.programs.iter().find(|p| p.id == program_id)
    }

    pub fn program_index(&self, program_id: Uuid) -> Option<usize> {
        self.programs.iter().position(|p| p.id == program_id)
    }

    /// (program index, semester index) of a semester anywhere in this school
    pub fn semester_position(&self, semester_id: Uuid) -> Option<(usize, usize)> {
        self.programs.iter().enumerate().find_map(|(pi, program)| {
            program
                .semester_index(semester_id)
                .map(|si| (pi, si))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    #[serde(rename = "_id", default = "new_id")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub semesters: Vec<Semester>,
}

impl Program {
    pub fn new(name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            semesters: Vec::new(),
        }
    }

    pub fn semester_index(&self, semester_id: Uuid) -> Option<usize> {
        self.semesters.iter().position(|s| s.id == semester_id)
    }
}

/// Nested roster: enrolled students mirrored against associated exams
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Semester {
    #[serde(rename = "_id", default = "new_id")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub students: Vec<Uuid>,
    #[serde(default)]
    pub exams: Vec<Uuid>,
}

impl Semester {
    pub fn new(name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            students: Vec::new(),
            exams: Vec::new(),
        }
    }
}

// ============================================================================
// Class (flat roster)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub students: Vec<Uuid>,
    #[serde(default)]
    pub exams: Vec<Uuid>,
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "now")]
    pub updated_at: DateTime<Utc>,
}

impl Class {
    pub fn new(name: String) -> Self {
        let at = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            students: Vec::new(),
            exams: Vec::new(),
            created_at: at,
            updated_at: at,
        }
    }
}

// ============================================================================
// Accounts
// ============================================================================

pub const STUDENT_ROLE: &str = "student";
pub const STAFF_ROLE: &str = "staff";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(rename = "_id")]
    pub id: Uuid,
    /// External identity-provider id
    pub uid: String,
    pub email: String,
    pub role: String,
    #[serde(default)]
    pub exams: Vec<Uuid>,
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "now")]
    pub updated_at: DateTime<Utc>,
}

impl Student {
    pub fn new(uid: String, email: String) -> Self {
        let at = Utc::now();
        Self {
            id: Uuid::new_v4(),
            uid,
            email,
            role: STUDENT_ROLE.to_string(),
            exams: Vec::new(),
            created_at: at,
            updated_at: at,
        }
    }

    pub fn has_exam(&self, exam_id: Uuid) -> bool {
        contains(&self.exams, exam_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Staff {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub uid: String,
    pub email: String,
    pub role: String,
    #[serde(default)]
    pub exams: Vec<Uuid>,
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "now")]
    pub updated_at: DateTime<Utc>,
}

impl Staff {
    pub fn new(uid: String, email: String) -> Self {
        let at = Utc::now();
        Self {
            id: Uuid::new_v4(),
            uid,
            email,
            role: STAFF_ROLE.to_string(),
            exams: Vec::new(),
            created_at: at,
            updated_at: at,
        }
    }
}

// ============================================================================
// Exams
// ============================================================================

/// Which roster model an exam (or an enrollment) targets
///
/// The flat Class model and the nested School/Program/Semester model are
/// distinct; semester ids are globally unique so a semester can be located
/// from its id alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum RosterRef {
    Class(Uuid),
    Semester(Uuid),
}

impl RosterRef {
    pub fn id(&self) -> Uuid {
        match self {
            RosterRef::Class(id) | RosterRef::Semester(id) => *id,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RosterRef::Class(_) => "Class",
            RosterRef::Semester(_) => "Semester",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub owner: RosterRef,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Minutes, at least 1
    pub duration: u32,
    /// Minutes granted for uploading answer files after the writing window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_duration: Option<u32>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "now")]
    pub updated_at: DateTime<Utc>,
}

impl Exam {
    pub fn question(&self, question_id: Uuid) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    /// Uploaded-file URLs attached to file-type questions
    pub fn question_file_urls(&self) -> Vec<String> {
        self.questions
            .iter()
            .filter_map(|q| match &q.kind {
                QuestionKind::File { file_url, .. } => file_url.clone(),
                _ => None,
            })
            .collect()
    }

    pub fn is_over(&self, at: DateTime<Utc>) -> bool {
        at > self.end_date
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id", default = "new_id")]
    pub id: Uuid,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QuestionKind {
    /// Multiple choice
    Mcq {
        #[serde(default)]
        options: Vec<String>,
    },
    Descriptive,
    /// Answered by uploading a file
    File {
        #[serde(rename = "fileTypesAllowed", default)]
        file_types_allowed: Option<FileTypesAllowed>,
        #[serde(rename = "fileUrl", default, skip_serializing_if = "Option::is_none")]
        file_url: Option<String>,
        #[serde(rename = "fileType", default, skip_serializing_if = "Option::is_none")]
        file_type: Option<String>,
    },
}

impl QuestionKind {
    pub fn tag(&self) -> &'static str {
        match self {
            QuestionKind::Mcq { .. } => "mcq",
            QuestionKind::Descriptive => "descriptive",
            QuestionKind::File { .. } => "file",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTypesAllowed {
    #[serde(default)]
    pub pdf: bool,
    #[serde(default)]
    pub doc: bool,
    #[serde(default)]
    pub docx: bool,
    #[serde(default)]
    pub jpg: bool,
    #[serde(default)]
    pub png: bool,
}

impl Default for FileTypesAllowed {
    fn default() -> Self {
        Self {
            pdf: true,
            doc: false,
            docx: false,
            jpg: true,
            png: true,
        }
    }
}

// ============================================================================
// Attempts
// ============================================================================

/// One uploaded answer file; never mutated after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub exam_id: Uuid,
    pub question_id: Uuid,
    pub uid: String,
    pub student_id: Uuid,
    pub file_url: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Violations {
    pub no_face_detected: u32,
    pub multiple_bodies: u32,
    pub tab_switched: u32,
    pub copy_paste_attempted: u32,
    pub voice_detected: u32,
}

impl Violations {
    /// Sum of all counters, clamped at `u32::MAX`
    pub fn total(&self) -> u32 {
        [
            self.no_face_detected,
            self.multiple_bodies,
            self.tab_switched,
            self.copy_paste_attempted,
            self.voice_detected,
        ]
        .iter()
        .fold(0u32, |sum, count| sum.saturating_add(*count))
    }
}

/// Proctoring report; at most one per (exam, student)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamReport {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub exam_id: Uuid,
    pub uid: String,
    pub student_id: Uuid,
    /// Absent while the report is still a progress placeholder
    #[serde(default)]
    pub report_url: Option<String>,
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub violations: Violations,
    #[serde(default)]
    pub total_violations: u32,
    #[serde(default)]
    pub exam_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub exam_end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub word_counts: Snapshot,
    #[serde(default)]
    pub user_answers: Snapshot,
    #[serde(default)]
    pub completed: bool,
    #[serde(default = "now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "now")]
    pub updated_at: DateTime<Utc>,
}

impl ExamReport {
    pub fn placeholder(exam_id: Uuid, student: &Student) -> Self {
        let at = Utc::now();
        Self {
            id: Uuid::new_v4(),
            exam_id,
            uid: student.uid.clone(),
            student_id: student.id,
            report_url: None,
            generated_at: at,
            violations: Violations::default(),
            total_violations: 0,
            exam_start_time: None,
            exam_end_time: None,
            word_counts: Snapshot::new(),
            user_answers: Snapshot::new(),
            completed: false,
            created_at: at,
            updated_at: at,
        }
    }
}

/// In-progress answers; exactly one per (exam, uid), replaced wholesale on save
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedAnswer {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub exam_id: Uuid,
    pub uid: String,
    #[serde(default)]
    pub user_answers: Snapshot,
    #[serde(default)]
    pub uploaded_file_urls: Snapshot,
    #[serde(default = "now")]
    pub updated_at: DateTime<Utc>,
}
