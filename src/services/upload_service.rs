//! Upload orchestration.
//!
//! A batch is validated up front, then each file runs its own
//! write → URL → persist sequence concurrently with the others. Results
//! come back in input order. A file whose URL or record step fails has its
//! freshly written object deleted again, so the store never holds an
//! object this call created without a matching record.

use super::{
    AccessPolicy,
    error::{FileUploadError, ServiceError, ServiceResult},
    keys::KeyGenerator,
    metadata_repository::{MetadataError, MetadataRepository},
    object_store::{ObjectMetadata, ObjectStore},
};
use crate::models::{
    file_record::NewFileRecord,
    upload::{IncomingFile, UploadedFile},
};
use futures::future::join_all;
use std::{sync::Arc, time::Duration};
use tracing::{error, info, warn};

pub const PDF_MEDIA_TYPE: &str = "application/pdf";

#[derive(Debug, Clone, Copy)]
pub struct UploadSettings {
    pub max_files: usize,
    pub access: AccessPolicy,
    pub persist_timeout: Duration,
}

#[derive(Clone)]
pub struct UploadService {
    store: Arc<dyn ObjectStore>,
    records: MetadataRepository,
    keys: Arc<KeyGenerator>,
    settings: UploadSettings,
}

/// True when `content_type` is `application/pdf`, ignoring parameters and case.
fn is_pdf(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|essence| essence.trim().eq_ignore_ascii_case(PDF_MEDIA_TYPE))
        .unwrap_or(false)
}

/// Object metadata travels as HTTP headers; keep only what survives that.
fn header_safe(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .collect()
}

impl UploadService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        records: MetadataRepository,
        keys: Arc<KeyGenerator>,
        settings: UploadSettings,
    ) -> Self {
        Self {
            store,
            records,
            keys,
            settings,
        }
    }

    pub fn max_files(&self) -> usize {
        self.settings.max_files
    }

    fn validate(&self, files: &[IncomingFile]) -> ServiceResult<()> {
        if files.is_empty() {
            return Err(ServiceError::NoFilesProvided);
        }
        if files.len() > self.settings.max_files {
            return Err(ServiceError::TooManyFiles {
                count: files.len(),
                max: self.settings.max_files,
            });
        }
        if let Some(file) = files.iter().find(|f| !is_pdf(&f.content_type)) {
            return Err(ServiceError::UnsupportedMediaType {
                filename: file.original_name.clone(),
                content_type: file.content_type.clone(),
            });
        }
        Ok(())
    }

    /// Store every file of the batch and record it.
    ///
    /// Fails as a whole if any file fails; files that did complete stay
    /// stored and recorded.
    pub async fn upload_batch(&self, files: Vec<IncomingFile>) -> ServiceResult<Vec<UploadedFile>> {
        self.validate(&files)?;
        let batch_size = files.len();

        let outcomes = join_all(files.into_iter().map(|file| self.upload_one(file))).await;

        let mut uploaded = Vec::with_capacity(batch_size);
        let mut failed = Vec::new();
        let mut first_error = None;
        for outcome in outcomes {
            match outcome {
                Ok(file) => uploaded.push(file),
                Err((filename, err)) => {
                    error!(%filename, error = %err, "file upload failed");
                    failed.push(filename);
                    first_error.get_or_insert(err);
                }
            }
        }

        if let Some(source) = first_error {
            return Err(ServiceError::UploadFailed { failed, source });
        }

        info!(count = batch_size, "upload batch stored");
        Ok(uploaded)
    }

    async fn upload_one(
        &self,
        file: IncomingFile,
    ) -> Result<UploadedFile, (String, FileUploadError)> {
        let IncomingFile {
            original_name,
            bytes,
            ..
        } = file;
        let size = bytes.len();
        let key = self.keys.next_key(&original_name);

        let metadata = ObjectMetadata::from([
            ("originalname".to_string(), header_safe(&original_name)),
            ("size".to_string(), size.to_string()),
        ]);

        if let Err(err) = self.store.put(&key, bytes, PDF_MEDIA_TYPE, metadata).await {
            return Err((original_name, FileUploadError::Write(err)));
        }

        match self.finish(&original_name, &key, size).await {
            Ok(uploaded) => Ok(uploaded),
            // The key already belongs to a recorded object; deleting would orphan that record.
            Err(err @ FileUploadError::Persist(MetadataError::DuplicateKey(_))) => {
                warn!(key, "storage key already recorded, leaving object in place");
                Err((original_name, err))
            }
            Err(err) => {
                self.compensate(&key).await;
                Err((original_name, err))
            }
        }
    }

    /// Issue the access URL and persist the record for an object already written.
    async fn finish(
        &self,
        original_name: &str,
        key: &str,
        size: usize,
    ) -> Result<UploadedFile, FileUploadError> {
        let url = self
            .settings
            .access
            .url_for(self.store.as_ref(), key)
            .await
            .map_err(FileUploadError::AccessUrl)?;

        let insert = self.records.insert(NewFileRecord {
            filename: original_name.to_string(),
            storage_key: key.to_string(),
            url: url.clone(),
            content_type: PDF_MEDIA_TYPE.to_string(),
            size_bytes: size as i64,
        });
        let record = tokio::time::timeout(self.settings.persist_timeout, insert)
            .await
            .map_err(|_| FileUploadError::PersistTimeout(self.settings.persist_timeout))?
            .map_err(FileUploadError::Persist)?;

        Ok(UploadedFile {
            filename: record.filename,
            url,
            key: record.storage_key,
            size,
            uploaded_at: record.created_at,
        })
    }

    async fn compensate(&self, key: &str) {
        match self.store.delete(key).await {
            Ok(()) => warn!(key, "removed object left without a metadata record"),
            Err(err) => error!(key, error = %err, "failed to remove orphaned object"),
        }
    }
}
