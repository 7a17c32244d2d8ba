//! Object store gateway.
//!
//! `ObjectStore` is the seam between the upload/retrieval services and the
//! place bytes actually live. `S3ObjectStore` talks to S3 (or an
//! S3-compatible endpoint), `LocalObjectStore` keeps objects on disk and
//! lets this service hand them back out via `GET /objects/{*key}`.

pub mod local;
pub mod s3;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::{collections::HashMap, time::Duration};
use thiserror::Error;

pub use local::LocalObjectStore;
pub use s3::S3ObjectStore;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("invalid object key `{0}`")]
    InvalidKey(String),
    #[error("failed to write object `{key}`: {reason}")]
    Write { key: String, reason: String },
    #[error("failed to presign object `{key}`: {reason}")]
    Presign { key: String, reason: String },
    #[error("object store request failed: {0}")]
    Backend(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

/// Summary of one stored object as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: i64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// User metadata attached to an object at write time.
pub type ObjectMetadata = HashMap<String, String>;

#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Short label used in logs and readiness output.
    fn backend_name(&self) -> &'static str;

    /// Write `bytes` under `key`, replacing anything already there.
    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
        metadata: ObjectMetadata,
    ) -> ObjectStoreResult<()>;

    /// Look an object up without fetching its body. `Ok(None)` when absent.
    async fn head(&self, key: &str) -> ObjectStoreResult<Option<ObjectInfo>>;

    /// Issue a time-limited URL for reading `key`.
    async fn presign(&self, key: &str, expires_in: Duration) -> ObjectStoreResult<String>;

    /// Permanent URL for `key`; only readable if the store serves it publicly.
    fn public_url(&self, key: &str) -> String;

    /// Every object whose key starts with `prefix`, sorted by key.
    async fn list(&self, prefix: &str) -> ObjectStoreResult<Vec<ObjectInfo>>;

    /// Remove `key`. Removing a missing object is not an error.
    async fn delete(&self, key: &str) -> ObjectStoreResult<()>;

    /// Cheap reachability check for readiness probes.
    async fn probe(&self) -> ObjectStoreResult<()>;
}
