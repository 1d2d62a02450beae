//! Question validation and question-file bookkeeping

use examhub_common::db::models::{Exam, FileTypesAllowed, Question, QuestionKind};
use examhub_common::{Error, Result};
use std::collections::HashSet;
use uuid::Uuid;

/// Check question shapes and fill in defaults
pub fn validate_questions(questions: &mut [Question]) -> Result<()> {
    if questions.is_empty() {
        return Err(Error::Validation("At least one question is required".to_string()));
    }

    let mut seen = HashSet::new();
    for question in questions.iter_mut() {
        if question.description.trim().is_empty() {
            return Err(Error::Validation(
                "All questions must have a description".to_string(),
            ));
        }
        if !seen.insert(question.id) {
            return Err(Error::Validation(format!(
                "Duplicate question id: {}",
                question.id
            )));
        }

        match &mut question.kind {
            QuestionKind::Mcq { options } if options.len() < 2 => {
                return Err(Error::Validation(
                    "MCQ questions must have at least 2 options".to_string(),
                ));
            }
            QuestionKind::File {
                file_types_allowed, ..
            } if file_types_allowed.is_none() => {
                *file_types_allowed = Some(FileTypesAllowed::default());
            }
            _ => {}
        }
    }

    Ok(())
}

/// Questions that submissions point at must survive an update unchanged
pub fn check_referenced_unchanged(
    old: &Exam,
    new: &[Question],
    referenced: &HashSet<Uuid>,
) -> Result<()> {
    for question_id in referenced {
        let Some(before) = old.question(*question_id) else {
            continue;
        };
        let after = new.iter().find(|q| q.id == *question_id);

        let unchanged = after.is_some_and(|q| {
            q.description == before.description && q.kind.tag() == before.kind.tag()
        });
        if !unchanged {
            return Err(Error::Conflict(format!(
                "Question {} has submissions and cannot be removed or changed",
                question_id
            )));
        }
    }
    Ok(())
}

/// File URLs attached to the old questions but not to the new ones
pub fn removed_file_urls(old: &Exam, new: &[Question]) -> Vec<String> {
    let kept: HashSet<&str> = new
        .iter()
        .filter_map(|q| match &q.kind {
            QuestionKind::File { file_url, .. } => file_url.as_deref(),
            _ => None,
        })
        .collect();

    old.question_file_urls()
        .into_iter()
        .filter(|url| !kept.contains(url.as_str()))
        .collect()
}
