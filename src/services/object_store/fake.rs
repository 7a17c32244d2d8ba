use super::{ObjectInfo, ObjectMetadata, ObjectStore, ObjectStoreError, ObjectStoreResult};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct FakeObject {
    pub bytes: Bytes,
    pub content_type: String,
    pub metadata: ObjectMetadata,
}

/// In-memory [`ObjectStore`] for tests.
///
/// Writes whose key contains a registered fragment fail, which lets tests
/// pick the file in a batch that should break.
#[derive(Clone, Default)]
pub struct FakeObjectStore {
    objects: Arc<Mutex<BTreeMap<String, FakeObject>>>,
    fail_puts: Arc<Mutex<HashSet<String>>>,
    deleted: Arc<Mutex<Vec<String>>>,
}

impl FakeObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `put` whose key contains `fragment` fail.
    pub async fn fake_fail_put(&self, fragment: &str) {
        self.fail_puts.lock().await.insert(fragment.to_string());
    }

    pub async fn fake_add_object(&self, key: &str, bytes: &'static [u8]) {
        self.objects.lock().await.insert(
            key.to_string(),
            FakeObject {
                bytes: Bytes::from_static(bytes),
                content_type: "application/pdf".into(),
                metadata: ObjectMetadata::new(),
            },
        );
    }

    pub async fn object(&self, key: &str) -> Option<FakeObject> {
        self.objects.lock().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.objects.lock().await.keys().cloned().collect()
    }

    /// Keys passed to `delete`, in call order.
    pub async fn deleted(&self) -> Vec<String> {
        self.deleted.lock().await.clone()
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    fn backend_name(&self) -> &'static str {
        "fake"
    }

    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
        metadata: ObjectMetadata,
    ) -> ObjectStoreResult<()> {
        let should_fail = self
            .fail_puts
            .lock()
            .await
            .iter()
            .any(|fragment| key.contains(fragment.as_str()));
        if should_fail {
            return Err(ObjectStoreError::Write {
                key: key.to_string(),
                reason: "injected failure".into(),
            });
        }

        self.objects.lock().await.insert(
            key.to_string(),
            FakeObject {
                bytes,
                content_type: content_type.to_string(),
                metadata,
            },
        );
        Ok(())
    }

    async fn head(&self, key: &str) -> ObjectStoreResult<Option<ObjectInfo>> {
        Ok(self.objects.lock().await.get(key).map(|obj| ObjectInfo {
            key: key.to_string(),
            size: obj.bytes.len() as i64,
            last_modified: Some(Utc::now()),
        }))
    }

    async fn presign(&self, key: &str, expires_in: Duration) -> ObjectStoreResult<String> {
        Ok(format!(
            "https://fake-bucket.example/{}?expires={}",
            key,
            expires_in.as_secs()
        ))
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://fake-bucket.example/{}", key)
    }

    async fn list(&self, prefix: &str) -> ObjectStoreResult<Vec<ObjectInfo>> {
        Ok(self
            .objects
            .lock()
            .await
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, obj)| ObjectInfo {
                key: key.clone(),
                size: obj.bytes.len() as i64,
                last_modified: Some(Utc::now()),
            })
            .collect())
    }

    async fn delete(&self, key: &str) -> ObjectStoreResult<()> {
        self.deleted.lock().await.push(key.to_string());
        self.objects.lock().await.remove(key);
        Ok(())
    }

    async fn probe(&self) -> ObjectStoreResult<()> {
        Ok(())
    }
}
