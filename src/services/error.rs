use super::metadata_repository::MetadataError;
use super::object_store::ObjectStoreError;
use std::time::Duration;
use thiserror::Error;

/// Why a single file in a batch did not make it.
#[derive(Debug, Error)]
pub enum FileUploadError {
    #[error("object write failed: {0}")]
    Write(#[source] ObjectStoreError),
    #[error("could not issue access URL: {0}")]
    AccessUrl(#[source] ObjectStoreError),
    #[error("metadata persist failed: {0}")]
    Persist(#[source] MetadataError),
    #[error("metadata persist timed out after {0:?}")]
    PersistTimeout(Duration),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no files provided")]
    NoFilesProvided,
    #[error("too many files: got {count}, at most {max} allowed")]
    TooManyFiles { count: usize, max: usize },
    #[error("`{filename}` has media type `{content_type}`, expected application/pdf")]
    UnsupportedMediaType {
        filename: String,
        content_type: String,
    },
    #[error("`{0}` not found")]
    NotFound(String),
    #[error("upload failed for {}: {source}", .failed.join(", "))]
    UploadFailed {
        failed: Vec<String>,
        #[source]
        source: FileUploadError,
    },
    #[error(transparent)]
    ObjectStore(#[from] ObjectStoreError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
