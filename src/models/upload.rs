//! Request and response shapes for uploads and listings.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One file pulled out of a multipart upload.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub original_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl IncomingFile {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Per-file result returned from `POST /upload`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub filename: String,
    pub url: String,
    pub key: String,
    pub size: usize,
    pub uploaded_at: DateTime<Utc>,
}

/// One entry of the `GET /newsletters` listing.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub key: String,
    pub filename: String,
    pub size: i64,
    pub last_modified: DateTime<Utc>,
    pub url: String,
}
