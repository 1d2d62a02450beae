//! Student and staff queries
//!
//! Both account kinds share one shape: external id, case-insensitive unique
//! email and an exam reference set.

use crate::db::models::{Staff, Student};
use crate::db::refs;
use crate::db::store::{self, Document};
use crate::Result;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

pub trait Account: Document {
    fn uid(&self) -> &str;
    fn email(&self) -> &str;
    fn exams(&self) -> &[Uuid];
    fn exams_mut(&mut self) -> &mut Vec<Uuid>;
}

macro_rules! account {
    ($ty:ty) => {
        impl Account for $ty {
            fn uid(&self) -> &str {
                &self.uid
            }

            fn email(&self) -> &str {
                &self.email
            }

            fn exams(&self) -> &[Uuid] {
                &self.exams
            }

            fn exams_mut(&mut self) -> &mut Vec<Uuid> {
                &mut self.exams
            }
        }
    };
}

account!(Student);
account!(Staff);

/// Trimmed, lowercased form used for storage and lookups
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Case-insensitive exact email match
pub async fn find_by_email<A: Account>(pool: &SqlitePool, email: &str) -> Result<Option<A>> {
    let sql = format!(
        "SELECT doc FROM {} WHERE lower(json_extract(doc, '$.email')) = ?",
        A::TABLE
    );
    let doc: Option<String> = sqlx::query_scalar(&sql)
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await?;

    Ok(doc.as_deref().map(serde_json::from_str::<A>).transpose()?)
}

pub async fn find_by_uid<A: Account>(pool: &SqlitePool, uid: &str) -> Result<Option<A>> {
    let mut found: Vec<A> = store::find_by_field(pool, "$.uid", uid).await?;
    Ok(found.pop())
}

/// Accounts whose exam set currently contains `exam_id`
pub async fn holding_exam<A: Account>(pool: &SqlitePool, exam_id: Uuid) -> Result<Vec<A>> {
    store::find_containing(pool, "$.exams", exam_id).await
}

/// Union `exam_ids` into each listed account; returns how many changed
pub async fn add_exams<A: Account>(
    pool: &SqlitePool,
    account_ids: &[Uuid],
    exam_ids: &[Uuid],
) -> Result<usize> {
    let accounts: Vec<A> = store::find_by_ids(pool, account_ids).await?;
    let mut changed = 0;

    for mut account in accounts {
        if refs::union_all(account.exams_mut(), exam_ids) {
            store::replace(pool, &mut account).await?;
            changed += 1;
        }
    }

    debug!("Added {} exam(s) to {} {} record(s)", exam_ids.len(), changed, A::KIND);
    Ok(changed)
}

/// Pull `exam_ids` out of each listed account; returns how many changed
pub async fn pull_exams<A: Account>(
    pool: &SqlitePool,
    account_ids: &[Uuid],
    exam_ids: &[Uuid],
) -> Result<usize> {
    if exam_ids.is_empty() {
        return Ok(0);
    }

    let accounts: Vec<A> = store::find_by_ids(pool, account_ids).await?;
    let mut changed = 0;

    for mut account in accounts {
        if refs::pull_all(account.exams_mut(), exam_ids) {
            store::replace(pool, &mut account).await?;
            changed += 1;
        }
    }

    debug!("Pulled {} exam(s) from {} {} record(s)", exam_ids.len(), changed, A::KIND);
    Ok(changed)
}

/// Union `exam_id` into every account of this kind
pub async fn broadcast_exam<A: Account>(pool: &SqlitePool, exam_id: Uuid) -> Result<usize> {
    let accounts: Vec<A> = store::find_all(pool).await?;
    let mut changed = 0;

    for mut account in accounts {
        if refs::union_insert(account.exams_mut(), exam_id) {
            store::replace(pool, &mut account).await?;
            changed += 1;
        }
    }

    Ok(changed)
}

/// Pull `exam_id` from every account that holds it
pub async fn pull_exam_everywhere<A: Account>(pool: &SqlitePool, exam_id: Uuid) -> Result<usize> {
    let holders: Vec<A> = holding_exam(pool, exam_id).await?;
    let count = holders.len();

    for mut account in holders {
        refs::pull(account.exams_mut(), exam_id);
        store::replace(pool, &mut account).await?;
    }

    Ok(count)
}
