//! Multipart form collection
//!
//! Bodies are small enough (bounded by the request body limit) to be read
//! completely before a handler looks at them.

use axum::extract::Multipart;
use examhub_common::time::parse_timestamp;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

use crate::error::{ApiError, ApiResult};
use crate::services::UploadedFile;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Default)]
pub struct Form {
    fields: HashMap<String, String>,
    files: Vec<(String, UploadedFile)>,
}

impl Form {
    pub async fn read(mut multipart: Multipart) -> ApiResult<Form> {
        let mut form = Form::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or(DEFAULT_CONTENT_TYPE)
                        .to_string();
                    let bytes = field.bytes().await?.to_vec();
                    form.files.push((
                        name,
                        UploadedFile {
                            file_name,
                            content_type,
                            bytes,
                        },
                    ));
                }
                None => {
                    let value = field.text().await?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    /// Text field, `None` when absent or blank
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn required(&self, name: &str) -> ApiResult<&str> {
        self.text(name)
            .ok_or_else(|| ApiError::validation(format!("{} is required", name)))
    }

    pub fn timestamp(&self, name: &str) -> ApiResult<DateTime<Utc>> {
        parse_timestamp(self.required(name)?)
            .ok_or_else(|| ApiError::validation(format!("Invalid {}", name)))
    }

    pub fn optional_timestamp(&self, name: &str) -> ApiResult<Option<DateTime<Utc>>> {
        self.text(name)
            .map(|value| {
                parse_timestamp(value).ok_or_else(|| ApiError::validation(format!("Invalid {}", name)))
            })
            .transpose()
    }

    pub fn number(&self, name: &str) -> ApiResult<Option<u32>> {
        self.text(name)
            .map(|value| {
                value
                    .parse::<u32>()
                    .map_err(|_| ApiError::validation(format!("{} must be a whole number", name)))
            })
            .transpose()
    }

    /// JSON-encoded text field; absent fields decode to `None`
    pub fn json<T: DeserializeOwned>(&self, name: &str, invalid: &str) -> ApiResult<Option<T>> {
        self.text(name)
            .map(|value| serde_json::from_str(value).map_err(|_| ApiError::validation(invalid)))
            .transpose()
    }

    /// Remove and return the first file sent under `name`
    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        let index = self.files.iter().position(|(field, _)| field == name)?;
        Some(self.files.remove(index).1)
    }

    /// Files sent as `questionFiles[<index>]`, keyed by index
    pub fn indexed_files(&mut self, prefix: &str) -> Vec<(usize, UploadedFile)> {
        let mut indexed = Vec::new();
        let mut rest = Vec::new();

        for (field, file) in self.files.drain(..) {
            match parse_index(&field, prefix) {
                Some(index) => indexed.push((index, file)),
                None => rest.push((field, file)),
            }
        }

        self.files = rest;
        indexed
    }
}

fn parse_index(field: &str, prefix: &str) -> Option<usize> {
    field
        .strip_prefix(prefix)?
        .strip_prefix('[')?
        .strip_suffix(']')?
        .parse()
        .ok()
}
