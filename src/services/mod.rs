//! Core services: key handling, the object store gateway, metadata
//! persistence, and the upload/catalog orchestration built on top.

pub mod catalog_service;
pub mod error;
pub mod keys;
pub mod metadata_repository;
pub mod object_store;
pub mod upload_service;

#[cfg(test)]
mod tests;

use crate::config::UrlMode;
use object_store::{ObjectStore, ObjectStoreResult};
use std::time::Duration;

/// How access URLs handed to clients are produced.
#[derive(Debug, Clone, Copy)]
pub struct AccessPolicy {
    pub url_mode: UrlMode,
    pub presign_expiry: Duration,
}

impl AccessPolicy {
    /// Presigned URLs are issued fresh on every call.
    pub async fn url_for(&self, store: &dyn ObjectStore, key: &str) -> ObjectStoreResult<String> {
        match self.url_mode {
            UrlMode::Presigned => store.presign(key, self.presign_expiry).await,
            UrlMode::Public => Ok(store.public_url(key)),
        }
    }
}
