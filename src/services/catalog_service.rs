//! Retrieval and listing.
//!
//! Retrieval resolves a storage key (or, in legacy mode, a filename) to a
//! URL the client is redirected to. Listing reads either the object store
//! itself or the metadata records; the two can disagree, and the store is
//! the default because it is where the bytes are.

use super::{
    AccessPolicy,
    error::{ServiceError, ServiceResult},
    keys::{KEY_PREFIX, display_name, sanitize_key_path},
    metadata_repository::MetadataRepository,
    object_store::{ObjectInfo, ObjectStore},
};
use crate::{
    config::{CatalogSource, ResolveBy},
    models::upload::CatalogEntry,
};
use chrono::Utc;
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct CatalogSettings {
    pub access: AccessPolicy,
    pub resolve_by: ResolveBy,
    pub source: CatalogSource,
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn ObjectStore>,
    records: MetadataRepository,
    settings: CatalogSettings,
}

impl CatalogService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        records: MetadataRepository,
        settings: CatalogSettings,
    ) -> Self {
        Self {
            store,
            records,
            settings,
        }
    }

    /// Resolve the `/files/...` path parameter according to the configured mode.
    pub async fn resolve(&self, raw: &str) -> ServiceResult<String> {
        match self.settings.resolve_by {
            ResolveBy::Key => self.resolve_key(raw).await,
            ResolveBy::Filename => self.resolve_filename(raw).await,
        }
    }

    /// Fresh access URL for a stored object.
    pub async fn resolve_key(&self, raw: &str) -> ServiceResult<String> {
        let key = sanitize_key_path(raw).ok_or_else(|| ServiceError::NotFound(raw.to_string()))?;

        if self.store.head(&key).await?.is_none() {
            debug!(%key, "object not in store");
            return Err(ServiceError::NotFound(key));
        }

        Ok(self.settings.access.url_for(self.store.as_ref(), &key).await?)
    }

    /// URL recorded at upload time for the newest record named `filename`.
    ///
    /// Returned as stored; a presigned URL recorded long ago may have expired.
    pub async fn resolve_filename(&self, filename: &str) -> ServiceResult<String> {
        self.records
            .find_by_filename(filename)
            .await?
            .map(|record| record.url)
            .ok_or_else(|| ServiceError::NotFound(filename.to_string()))
    }

    pub async fn list_all(&self) -> ServiceResult<Vec<CatalogEntry>> {
        match self.settings.source {
            CatalogSource::Store => self.list_from_store().await,
            CatalogSource::Records => self.list_from_records().await,
        }
    }

    async fn list_from_store(&self) -> ServiceResult<Vec<CatalogEntry>> {
        let objects = self.store.list(KEY_PREFIX).await?;
        let entries = try_join_all(objects.into_iter().map(|object| self.entry_for(object))).await?;
        Ok(entries)
    }

    async fn entry_for(&self, object: ObjectInfo) -> ServiceResult<CatalogEntry> {
        let url = self
            .settings
            .access
            .url_for(self.store.as_ref(), &object.key)
            .await?;
        Ok(CatalogEntry {
            filename: display_name(&object.key),
            size: object.size,
            last_modified: object.last_modified.unwrap_or_else(Utc::now),
            url,
            key: object.key,
        })
    }

    async fn list_from_records(&self) -> ServiceResult<Vec<CatalogEntry>> {
        Ok(self
            .records
            .list_newest_first()
            .await?
            .into_iter()
            .map(|record| CatalogEntry {
                key: record.storage_key,
                filename: record.filename,
                size: record.size_bytes,
                last_modified: record.created_at,
                url: record.url,
            })
            .collect())
    }
}
