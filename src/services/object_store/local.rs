//! Disk-backed object store.
//!
//! Payloads live at `base_path/{key}`; content type and user metadata sit
//! beside them in a `{key}.meta.json` sidecar. Objects are published back
//! to clients by this service at `{public_base_url}/objects/{key}`, so a
//! "presigned" URL here is just the public one.

use super::{ObjectInfo, ObjectMetadata, ObjectStore, ObjectStoreError, ObjectStoreResult};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const MAX_OBJECT_KEY_LEN: usize = 1024;
const SIDECAR_SUFFIX: &str = ".meta.json";
const TMP_PREFIX: &str = ".tmp-";

/// Sidecar persisted next to each payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredObjectMeta {
    pub content_type: String,
    pub etag: String,
    pub metadata: ObjectMetadata,
}

#[derive(Clone, Debug)]
pub struct LocalObjectStore {
    base_path: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    pub fn new(base_path: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Reject keys that could escape `base_path` or shadow internal files.
    fn ensure_key_safe(key: &str) -> ObjectStoreResult<()> {
        let invalid = || ObjectStoreError::InvalidKey(key.to_string());
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return Err(invalid());
        }
        if key
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(invalid());
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(invalid());
        }
        let file_name = key.rsplit('/').next().unwrap_or(key);
        if file_name.is_empty() || file_name.starts_with(TMP_PREFIX) || file_name.ends_with(SIDECAR_SUFFIX)
        {
            return Err(invalid());
        }
        Ok(())
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }

    fn sidecar_path(path: &Path) -> PathBuf {
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(SIDECAR_SUFFIX);
        path.with_file_name(name)
    }

    async fn read_sidecar(path: &Path) -> Option<StoredObjectMeta> {
        let raw = fs::read(Self::sidecar_path(path)).await.ok()?;
        serde_json::from_slice(&raw).ok()
    }

    /// Write `bytes` to a temp file in `parent`, fsync it, then rename into place.
    async fn write_atomic(parent: &Path, target: &Path, bytes: &[u8]) -> io::Result<()> {
        let tmp_path = parent.join(format!("{}{}", TMP_PREFIX, Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let written = async {
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        if let Err(err) = written {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err);
        }

        if let Err(err) = fs::rename(&tmp_path, target).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err);
        }
        Ok(())
    }

    /// Open a stored payload for streaming back to a client.
    pub async fn open(&self, key: &str) -> ObjectStoreResult<(StoredObjectMeta, u64, File)> {
        Self::ensure_key_safe(key)?;
        let path = self.object_path(key);
        let file = File::open(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                ObjectStoreError::NotFound(key.to_string())
            } else {
                ObjectStoreError::Io(err)
            }
        })?;
        let len = file.metadata().await?.len();
        let meta = Self::read_sidecar(&path).await.unwrap_or_else(|| StoredObjectMeta {
            content_type: "application/octet-stream".into(),
            etag: String::new(),
            metadata: ObjectMetadata::new(),
        });
        Ok((meta, len, file))
    }

    /// Remove empty directories from `start` up to (not including) `stop`.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

fn path_to_key(base: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let parts: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
    Some(parts?.join("/"))
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
        metadata: ObjectMetadata,
    ) -> ObjectStoreResult<()> {
        Self::ensure_key_safe(key)?;
        let path = self.object_path(key);
        let parent = path.parent().map(Path::to_path_buf).ok_or_else(|| {
            ObjectStoreError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;

        let sidecar = StoredObjectMeta {
            content_type: content_type.to_string(),
            etag: format!("{:x}", md5::compute(&bytes)),
            metadata,
        };
        let sidecar_bytes = serde_json::to_vec(&sidecar).map_err(|err| ObjectStoreError::Write {
            key: key.to_string(),
            reason: err.to_string(),
        })?;

        Self::write_atomic(&parent, &path, &bytes).await?;
        if let Err(err) = Self::write_atomic(&parent, &Self::sidecar_path(&path), &sidecar_bytes).await
        {
            let _ = fs::remove_file(&path).await;
            return Err(err.into());
        }

        debug!(key, size = bytes.len(), "object written to {}", path.display());
        Ok(())
    }

    async fn head(&self, key: &str) -> ObjectStoreResult<Option<ObjectInfo>> {
        // Nothing is ever written under an unsafe key.
        if Self::ensure_key_safe(key).is_err() {
            return Ok(None);
        }
        match fs::metadata(self.object_path(key)).await {
            Ok(meta) if meta.is_file() => Ok(Some(ObjectInfo {
                key: key.to_string(),
                size: meta.len() as i64,
                last_modified: meta.modified().ok().map(DateTime::<Utc>::from),
            })),
            Ok(_) => Ok(None),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn presign(&self, key: &str, _expires_in: Duration) -> ObjectStoreResult<String> {
        Self::ensure_key_safe(key)?;
        Ok(self.public_url(key))
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/objects/{}", self.public_base_url, key)
    }

    async fn list(&self, prefix: &str) -> ObjectStoreResult<Vec<ObjectInfo>> {
        let mut objects = Vec::new();
        let mut pending = vec![self.base_path.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }

                let Some(key) = path_to_key(&self.base_path, &path) else {
                    continue;
                };
                if !key.starts_with(prefix) || Self::ensure_key_safe(&key).is_err() {
                    continue;
                }

                let meta = entry.metadata().await?;
                objects.push(ObjectInfo {
                    key,
                    size: meta.len() as i64,
                    last_modified: meta.modified().ok().map(DateTime::<Utc>::from),
                });
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn delete(&self, key: &str) -> ObjectStoreResult<()> {
        Self::ensure_key_safe(key)?;
        let path = self.object_path(key);
        for target in [Self::sidecar_path(&path), path.clone()] {
            match fs::remove_file(&target).await {
                Ok(_) => debug!("removed {}", target.display()),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }

        if let Some(parent) = path.parent() {
            self.prune_empty_dirs(parent, &self.base_path).await;
        }
        Ok(())
    }

    async fn probe(&self) -> ObjectStoreResult<()> {
        fs::create_dir_all(&self.base_path).await?;
        let probe_path = self.base_path.join(format!("{}readyz-{}", TMP_PREFIX, Uuid::new_v4()));
        fs::write(&probe_path, b"readyz").await?;
        let read_back = fs::read(&probe_path).await;
        let _ = fs::remove_file(&probe_path).await;
        if read_back? != b"readyz" {
            return Err(ObjectStoreError::Backend("probe file content mismatch".into()));
        }
        Ok(())
    }
}
