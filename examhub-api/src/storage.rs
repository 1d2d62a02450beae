//! Blob storage (upload relay)
//!
//! Uploaded files are written under a storage root and handed back as public
//! URLs. The service itself serves the root at `/files`.

use async_trait::async_trait;
use examhub_common::{time, Error, Result};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Byte-store collaborator addressed by public URL
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at the relative object `path`; returns the public URL
    async fn store(&self, bytes: &[u8], path: &str, content_type: &str) -> Result<String>;

    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;

    async fn delete(&self, url: &str) -> Result<()>;
}

/// Filesystem-backed blob store
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: PathBuf, public_base_url: impl Into<String>) -> Self {
        Self {
            root,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let clean = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(Error::Validation(format!("Invalid object path: {}", path)));
        }
        Ok(self.root.join(relative))
    }

    fn path_from_url<'a>(&self, url: &'a str) -> Result<&'a str> {
        url.strip_prefix(&self.public_base_url)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| Error::NotFound(format!("File not found: {}", url)))
    }
}

fn upstream(action: &str, err: std::io::Error) -> Error {
    Error::Upstream(format!("Blob {} failed: {}", action, err))
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn store(&self, bytes: &[u8], path: &str, content_type: &str) -> Result<String> {
        let target = self.object_path(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| upstream("store", e))?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| upstream("store", e))?;

        debug!("Stored {} bytes ({}) at {}", bytes.len(), content_type, path);
        Ok(format!("{}/{}", self.public_base_url, path))
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let target = self.object_path(self.path_from_url(url)?)?;
        tokio::fs::read(&target).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::NotFound(format!("File not found: {}", url)),
            _ => upstream("fetch", e),
        })
    }

    async fn delete(&self, url: &str) -> Result<()> {
        let target = self.object_path(self.path_from_url(url)?)?;
        tokio::fs::remove_file(&target).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::NotFound(format!("File not found: {}", url)),
            _ => upstream("delete", e),
        })?;

        debug!("Deleted blob {}", url);
        Ok(())
    }
}

/// Delete each URL, logging failures instead of returning them
pub async fn delete_quietly(blobs: &dyn BlobStore, urls: &[String]) {
    for url in urls {
        if let Err(e) = blobs.delete(url).await {
            warn!("Failed to delete file {}: {}", url, e);
        }
    }
}

// ============================================================================
// Object naming
// ============================================================================

/// Keep only characters that are safe in a single path segment
pub fn sanitize_segment(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// Last path segment of a URL, used for archive entry names
pub fn file_name_from_url(url: &str) -> String {
    url.rsplit('/')
        .next()
        .map(sanitize_segment)
        .unwrap_or_else(|| "file".to_string())
}

pub fn question_file_path(file_name: &str) -> String {
    format!(
        "exam-questions/{}-{}",
        time::epoch_millis(),
        sanitize_segment(file_name)
    )
}

pub fn submission_path(exam_id: Uuid, uid: &str, file_name: &str) -> String {
    format!(
        "student-submissions/{}/{}/{}-{}",
        exam_id,
        sanitize_segment(uid),
        time::epoch_millis(),
        sanitize_segment(file_name)
    )
}

pub fn report_path(exam_id: Uuid, uid: &str, file_name: &str) -> String {
    format!(
        "exam-reports/{}/{}/{}-{}",
        exam_id,
        sanitize_segment(uid),
        time::epoch_millis(),
        sanitize_segment(file_name)
    )
}

// ============================================================================
// Upload policy
// ============================================================================

/// Types accepted for question attachments and student answer files
pub const DOCUMENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

pub const REPORT_TYPE: &str = "application/pdf";

pub const MAX_REPORT_BYTES: usize = 5 * 1024 * 1024;

pub fn check_document_type(content_type: &str) -> Result<()> {
    if DOCUMENT_TYPES.contains(&content_type) {
        Ok(())
    } else {
        Err(Error::Validation(
            "Only JPEG, PNG, PDF, DOC and DOCX files are allowed".to_string(),
        ))
    }
}

pub fn check_report_file(content_type: &str, size: usize) -> Result<()> {
    if content_type != REPORT_TYPE {
        return Err(Error::Validation("Only PDF files are allowed".to_string()));
    }
    if size > MAX_REPORT_BYTES {
        return Err(Error::Validation(
            "Report file exceeds the 5 MB limit".to_string(),
        ));
    }
    Ok(())
}
