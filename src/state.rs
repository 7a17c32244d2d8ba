//! Shared application state handed to every handler.

use crate::{
    config::{AppConfig, StorageBackend},
    services::{
        AccessPolicy,
        catalog_service::{CatalogService, CatalogSettings},
        keys::KeyGenerator,
        metadata_repository::MetadataRepository,
        object_store::{LocalObjectStore, ObjectStore, S3ObjectStore},
        upload_service::{UploadService, UploadSettings},
    },
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub uploads: UploadService,
    pub catalog: CatalogService,
    pub records: MetadataRepository,
    pub store: Arc<dyn ObjectStore>,
    /// Set when objects live on local disk and are served by `GET /objects/{*key}`.
    pub local_store: Option<LocalObjectStore>,
    /// Include error causes in response bodies.
    pub development: bool,
    pub max_body_bytes: usize,
}

impl AppState {
    /// Wire the services for `cfg` around an already connected repository.
    pub async fn from_config(cfg: &AppConfig, records: MetadataRepository) -> anyhow::Result<Self> {
        let local_store = match cfg.backend {
            StorageBackend::Local => Some(LocalObjectStore::new(
                &cfg.storage_dir,
                cfg.public_base_url.clone(),
            )),
            StorageBackend::S3 => None,
        };
        let store: Arc<dyn ObjectStore> = match (&local_store, &cfg.s3) {
            (Some(local), _) => Arc::new(local.clone()),
            (None, Some(s3)) => Arc::new(S3ObjectStore::new(s3).await),
            (None, None) => anyhow::bail!("S3 backend selected without S3 settings"),
        };

        Ok(Self::with_store(cfg, store, local_store, records))
    }

    /// Wire the services around an explicit object store.
    pub fn with_store(
        cfg: &AppConfig,
        store: Arc<dyn ObjectStore>,
        local_store: Option<LocalObjectStore>,
        records: MetadataRepository,
    ) -> Self {
        let access = AccessPolicy {
            url_mode: cfg.url_mode,
            presign_expiry: cfg.presign_expiry,
        };
        let uploads = UploadService::new(
            store.clone(),
            records.clone(),
            Arc::new(KeyGenerator::new()),
            UploadSettings {
                max_files: cfg.max_files,
                access,
                persist_timeout: cfg.persist_timeout,
            },
        );
        let catalog = CatalogService::new(
            store.clone(),
            records.clone(),
            CatalogSettings {
                access,
                resolve_by: cfg.resolve_by,
                source: cfg.catalog_source,
            },
        );

        Self {
            uploads,
            catalog,
            records,
            store,
            local_store,
            development: cfg.development,
            max_body_bytes: cfg.max_body_bytes,
        }
    }
}
