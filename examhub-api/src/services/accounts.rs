//! Student and staff accounts
//!
//! Every account is a pair: an identity-provider login and a store record
//! that references it by its external uid.

use chrono::Utc;
use examhub_common::config::AdminConfig;
use examhub_common::db::accounts::{self, normalize_email, Account};
use examhub_common::db::models::{Exam, Staff, Student, STAFF_ROLE, STUDENT_ROLE};
use examhub_common::db::store;
use examhub_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::identity::IdentityGateway;
use crate::sync::enrollment::EntryError;

/// Email/password pair from a create request
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct BulkAccounts<A> {
    pub created: Vec<A>,
    pub errors: Vec<EntryError>,
}

/// Create the login, then the record built from (uid, email)
///
/// The email is checked against the store before the identity provider is
/// called. When the record cannot be written the fresh login is removed.
async fn create_account<A, F>(
    pool: &SqlitePool,
    identity: &dyn IdentityGateway,
    credentials: &Credentials,
    build: F,
) -> Result<A>
where
    A: Account,
    F: FnOnce(String, String) -> A,
{
    let email = normalize_email(&credentials.email);
    if email.is_empty() || credentials.password.is_empty() {
        return Err(Error::Validation("Email and password are required".to_string()));
    }
    if accounts::find_by_email::<A>(pool, &email).await?.is_some() {
        return Err(Error::Conflict(format!(
            "{} with this email already exists",
            A::KIND
        )));
    }

    let uid = identity.create_account(&email, &credentials.password).await?;
    let account = build(uid.clone(), email);

    if let Err(e) = store::insert(pool, &account).await {
        if let Err(cleanup) = identity.delete_account(&uid).await {
            warn!("Failed to remove orphaned login {}: {}", uid, cleanup);
        }
        return Err(e);
    }

    info!("Created {} {} ({})", A::KIND, account.email(), uid);
    Ok(account)
}

pub async fn create_student(
    pool: &SqlitePool,
    identity: &dyn IdentityGateway,
    credentials: &Credentials,
) -> Result<Student> {
    create_account(pool, identity, credentials, Student::new).await
}

/// New staff start out holding every existing exam
pub async fn create_staff(
    pool: &SqlitePool,
    identity: &dyn IdentityGateway,
    credentials: &Credentials,
) -> Result<Staff> {
    let exam_ids: Vec<_> = store::find_all::<Exam>(pool)
        .await?
        .into_iter()
        .map(|exam| exam.id)
        .collect();

    create_account(pool, identity, credentials, move |uid, email| {
        let mut staff = Staff::new(uid, email);
        staff.exams = exam_ids;
        staff
    })
    .await
}

async fn bulk_create<A, F, Fut>(entries: &[Credentials], mut create: F) -> BulkAccounts<A>
where
    F: FnMut(Credentials) -> Fut,
    Fut: std::future::Future<Output = Result<A>>,
{
    let mut outcome = BulkAccounts {
        created: Vec::new(),
        errors: Vec::new(),
    };

    for entry in entries {
        match create(entry.clone()).await {
            Ok(account) => outcome.created.push(account),
            Err(e) => {
                warn!("Skipping {} in bulk account creation: {}", entry.email, e);
                outcome.errors.push(EntryError {
                    email: entry.email.clone(),
                    error: e.message(),
                });
            }
        }
    }

    info!(
        "Bulk account creation: {} created, {} failed",
        outcome.created.len(),
        outcome.errors.len()
    );
    outcome
}

pub async fn bulk_create_students(
    pool: &SqlitePool,
    identity: &dyn IdentityGateway,
    entries: &[Credentials],
) -> BulkAccounts<Student> {
    bulk_create(entries, |credentials| async move {
        create_student(pool, identity, &credentials).await
    })
    .await
}

pub async fn bulk_create_staff(
    pool: &SqlitePool,
    identity: &dyn IdentityGateway,
    entries: &[Credentials],
) -> BulkAccounts<Staff> {
    bulk_create(entries, |credentials| async move {
        create_staff(pool, identity, &credentials).await
    })
    .await
}

/// Remove the login first; a provider failure leaves the record in place
pub async fn delete_by_email<A: Account>(
    pool: &SqlitePool,
    identity: &dyn IdentityGateway,
    email: &str,
) -> Result<A> {
    let account = accounts::find_by_email::<A>(pool, email)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{} not found", A::KIND)))?;

    identity.delete_account(account.uid()).await?;
    store::delete::<A>(pool, account.id()).await?;

    info!("Deleted {} {} ({})", A::KIND, account.email(), account.uid());
    Ok(account)
}

/// An exam as shown on a staff dashboard
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffExam {
    #[serde(flatten)]
    pub exam: Exam,
    pub is_exam_over: bool,
}

pub async fn staff_exams(pool: &SqlitePool, uid: &str) -> Result<Vec<StaffExam>> {
    let staff = accounts::find_by_uid::<Staff>(pool, uid)
        .await?
        .ok_or_else(|| Error::NotFound("Staff not found".to_string()))?;

    let now = Utc::now();
    Ok(store::find_by_ids::<Exam>(pool, &staff.exams)
        .await?
        .into_iter()
        .map(|exam| StaffExam {
            is_exam_over: exam.is_over(now),
            exam,
        })
        .collect())
}

/// Role tag of whoever owns this uid
pub async fn role_of(pool: &SqlitePool, uid: &str) -> Result<&'static str> {
    if accounts::find_by_uid::<Student>(pool, uid).await?.is_some() {
        return Ok(STUDENT_ROLE);
    }
    if accounts::find_by_uid::<Staff>(pool, uid).await?.is_some() {
        return Ok(STAFF_ROLE);
    }
    Err(Error::NotFound("User not found".to_string()))
}

/// Create the configured admin staff account if it does not exist yet
pub async fn bootstrap_admin(pool: &SqlitePool, identity: &dyn IdentityGateway, admin: &AdminConfig) {
    let credentials = Credentials {
        email: admin.email.clone(),
        password: admin.password.clone(),
    };

    match create_staff(pool, identity, &credentials).await {
        Ok(staff) => info!("Admin account {} created", staff.email),
        Err(Error::Conflict(_)) => info!("Admin account {} already exists", admin.email),
        Err(e) => warn!("Admin bootstrap failed: {}", e),
    }
}
