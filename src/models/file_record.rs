//! Metadata row describing one stored PDF.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A persisted record for an object written to the store.
///
/// Inserted only after the object write succeeded and never updated
/// afterwards.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Filename as the client sent it.
    pub filename: String,

    /// Key locating the object in the store; unique across all records.
    pub storage_key: String,

    /// Access URL captured at upload time. Presigned URLs stored here expire.
    pub url: String,

    /// Media type the object was written with.
    pub content_type: String,

    /// Payload size in bytes.
    pub size_bytes: i64,

    /// Insert time.
    pub created_at: DateTime<Utc>,
}

/// Fields supplied by the caller when inserting a record.
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub filename: String,
    pub storage_key: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: i64,
}
