use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use super::{ObjectStorage, StorageError, StorageResult};

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Process-local object store used with `SKIP_EXTERNALS` and in tests
#[derive(Default)]
pub struct InMemoryStorage {
    objects: Mutex<HashMap<String, StoredObject>>,
    fail_uploads: AtomicBool,
    fail_signing: AtomicBool,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_signing(&self, fail: bool) {
        self.fail_signing.store(fail, Ordering::SeqCst);
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.lock().await.contains_key(key)
    }

    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ObjectStorage for InMemoryStorage {
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<()> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::Request("upload failed".to_string()));
        }
        self.objects.lock().await.insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        self.objects.lock().await.remove(key);
        Ok(())
    }

    async fn signed_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        if self.fail_signing.load(Ordering::SeqCst) {
            return Err(StorageError::Request("signing failed".to_string()));
        }
        if !self.contains(key).await {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(format!(
            "memory://{}?expires_in={}",
            key,
            expires_in.as_secs()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_sign_remove() {
        let storage = InMemoryStorage::new();
        storage
            .upload("u/photo/1_me.jpg", vec![0xFF, 0xD8], "image/jpeg")
            .await
            .unwrap();
        assert!(storage.contains("u/photo/1_me.jpg").await);

        let url = storage
            .signed_url("u/photo/1_me.jpg", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(url.contains("expires_in=60"));

        storage.remove("u/photo/1_me.jpg").await.unwrap();
        assert!(storage.is_empty().await);
        assert!(storage
            .signed_url("u/photo/1_me.jpg", Duration::from_secs(60))
            .await
            .is_err());
    }
}
