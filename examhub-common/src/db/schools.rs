//! School queries
//!
//! Programs and semesters are nested inside the school document; the only
//! way to reach a semester is through the school that owns it.

use crate::db::models::School;
use crate::db::store;
use crate::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

/// School whose name matches exactly (after trimming), if any
pub async fn find_by_name(pool: &SqlitePool, name: &str) -> Result<Option<School>> {
    let mut found: Vec<School> = store::find_by_field(pool, "$.name", name.trim()).await?;
    Ok(found.pop())
}

/// School owning the semester with this id, searching every program
pub async fn find_by_semester(pool: &SqlitePool, semester_id: Uuid) -> Result<Option<School>> {
    let doc: Option<String> = sqlx::query_scalar(
        r#"
        SELECT s.doc
        FROM schools s,
             json_each(s.doc, '$.programs') p,
             json_each(p.value, '$.semesters') sem
        WHERE json_extract(sem.value, '$._id') = ?
        LIMIT 1
        "#,
    )
    .bind(semester_id.to_string())
    .fetch_optional(pool)
    .await?;

    Ok(doc.as_deref().map(serde_json::from_str::<School>).transpose()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_memory_database;
    use crate::db::models::{Program, Semester};

    #[tokio::test]
    async fn test_find_by_semester_searches_all_programs() {
        let pool = init_memory_database().await.unwrap();

        let mut other = School::new("Arts".into());
        other.programs.push(Program::new("Painting".into()));
        store::insert(&pool, &other).await.unwrap();

        let mut school = School::new("Science".into());
        let mut program = Program::new("Physics".into());
        program.semesters.push(Semester::new("Fall".into()));
        let semester = Semester::new("Spring".into());
        let semester_id = semester.id;
        program.semesters.push(semester);
        school.programs.push(Program::new("Biology".into()));
        school.programs.push(program);
        store::insert(&pool, &school).await.unwrap();

        let found = find_by_semester(&pool, semester_id).await.unwrap().unwrap();
        assert_eq!(found.id, school.id);
        assert_eq!(found.semester_position(semester_id), Some((1, 1)));

        assert!(find_by_semester(&pool, Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_name_trims() {
        let pool = init_memory_database().await.unwrap();
        let school = School::new("Engineering".into());
        store::insert(&pool, &school).await.unwrap();

        let found = find_by_name(&pool, "  Engineering ").await.unwrap();
        assert_eq!(found.map(|s| s.id), Some(school.id));
        assert!(find_by_name(&pool, "engineering").await.unwrap().is_none());
    }
}
