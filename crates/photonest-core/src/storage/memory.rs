use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::{normalize_content_type, normalize_object_key, MediaStorage};
use crate::{Error, Result};

const MEMORY_BASE_URL: &str = "memory://media";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Media storage held in process memory.
#[derive(Clone, Default)]
pub struct InMemoryMediaStorage {
    objects: Arc<Mutex<HashMap<String, StoredObject>>>,
    offline: Arc<AtomicBool>,
}

impl InMemoryMediaStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn object(&self, object_key: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .ok()
            .and_then(|objects| objects.get(object_key.trim_matches('/')).cloned())
    }

    pub fn len(&self) -> usize {
        self.objects.lock().map_or(0, |objects| objects.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn objects(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, StoredObject>>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network("media storage is offline".to_string()));
        }
        self.objects
            .lock()
            .map_err(|_| Error::Storage("media storage lock poisoned".to_string()))
    }
}

impl MediaStorage for InMemoryMediaStorage {
    async fn upload(
        &self,
        object_key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<String> {
        let object_key = normalize_object_key(object_key)?;
        self.objects()?.insert(
            object_key.clone(),
            StoredObject {
                bytes,
                content_type: normalize_content_type(content_type),
            },
        );
        Ok(self.public_url(&object_key))
    }

    async fn delete(&self, object_key: &str) -> Result<()> {
        let object_key = normalize_object_key(object_key)?;
        self.objects()?.remove(&object_key);
        Ok(())
    }

    fn public_url(&self, object_key: &str) -> String {
        format!("{MEMORY_BASE_URL}/{}", object_key.trim_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn upload_and_delete() {
        let storage = InMemoryMediaStorage::new();
        let url = storage
            .upload("posts/u1/a.png", vec![1, 2, 3], Some("image/png"))
            .await
            .unwrap();
        assert_eq!(url, "memory://media/posts/u1/a.png");
        assert_eq!(
            storage.object("posts/u1/a.png").unwrap().content_type.as_deref(),
            Some("image/png")
        );

        storage.delete("/posts/u1/a.png").await.unwrap();
        assert!(storage.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_upload_is_network_error() {
        let storage = InMemoryMediaStorage::new();
        storage.set_offline(true);
        let error = storage.upload("k", vec![1], None).await.unwrap_err();
        assert!(error.is_network());
    }
}
