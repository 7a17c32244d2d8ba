//! HTTP handlers for uploading, resolving, and listing PDFs.
//! Storage and record keeping are delegated to the services in `AppState`.

use crate::{
    errors::AppError,
    models::upload::{CatalogEntry, IncomingFile, UploadedFile},
    services::{
        error::ServiceError,
        object_store::{ObjectStoreError, local::StoredObjectMeta},
    },
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

/// Multipart field carrying the uploaded files.
const FILES_FIELD: &str = "files";

/// `POST /upload`: store every `files` part of a multipart body.
pub async fn upload_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let max_files = state.uploads.max_files();
    let mut files = Vec::new();
    let mut seen = 0usize;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILES_FIELD) {
            debug!(field = ?field.name(), "ignoring multipart field");
            continue;
        }
        seen += 1;
        // Past the limit only count the rest; no need to buffer them.
        if seen > max_files {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await?;
        files.push(IncomingFile {
            original_name,
            content_type,
            bytes,
        });
    }

    if seen > max_files {
        return Err(ServiceError::TooManyFiles {
            count: seen,
            max: max_files,
        }
        .into());
    }

    info!(
        count = files.len(),
        bytes = files.iter().map(IncomingFile::size).sum::<usize>(),
        "upload received"
    );
    let uploaded: Vec<UploadedFile> = state.uploads.upload_batch(files).await?;
    Ok((StatusCode::CREATED, Json(uploaded)))
}

/// `GET /files/{*key}`: redirect to the object's access URL.
pub async fn get_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let url = state.catalog.resolve(&key).await?;
    Ok((StatusCode::FOUND, [(header::LOCATION, url)]).into_response())
}

/// `GET /newsletters`: every stored PDF.
pub async fn list_newsletters(
    State(state): State<AppState>,
) -> Result<Json<Vec<CatalogEntry>>, AppError> {
    Ok(Json(state.catalog.list_all().await?))
}

/// `GET /objects/{*key}`: stream a payload held by the local backend.
pub async fn get_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let Some(local) = state.local_store.as_ref() else {
        return Err(AppError::not_found("file not found"));
    };
    let (meta, len, file) = local.open(&key).await.map_err(|err| match err {
        ObjectStoreError::NotFound(_) | ObjectStoreError::InvalidKey(_) => {
            AppError::not_found("file not found")
        }
        other => ServiceError::from(other).into(),
    })?;

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), &meta, len);
    Ok(response)
}

fn set_object_headers(headers: &mut HeaderMap, meta: &StoredObjectMeta, len: u64) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&meta.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));

    if !meta.etag.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", meta.etag)) {
            headers.insert(header::ETAG, value);
        }
    }
}
