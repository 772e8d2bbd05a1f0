use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use super::{join_url, object_key, ArtifactStore, StorageError};

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Bytes,
    pub content_type: String,
}

/// Process-local artifact store for local runs (`STORAGE_BACKEND=memory`) and tests.
/// Objects are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    dir_prefix: String,
    url_prefix: String,
    objects: Mutex<HashMap<String, StoredObject>>,
    calls: AtomicUsize,
    #[cfg(test)]
    failing_paths: Mutex<Vec<String>>,
    #[cfg(test)]
    failing_reads: Mutex<Vec<String>>,
}

impl MemoryArtifactStore {
    pub fn new(dir_prefix: impl Into<String>, url_prefix: impl Into<String>) -> Self {
        Self {
            dir_prefix: dir_prefix.into(),
            url_prefix: url_prefix.into(),
            ..Self::default()
        }
    }

    /// Total number of trait operations served, including failed ones.
    #[cfg(test)]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Snapshot of the object stored at a relative path.
    #[cfg(test)]
    pub fn object(&self, path: &str) -> Option<StoredObject> {
        let key = object_key(&self.dir_prefix, path);
        self.lock().get(&key).cloned()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    pub fn fail_writes_to(&self, path: &str) {
        if let Ok(mut paths) = self.failing_paths.lock() {
            paths.push(object_key(&self.dir_prefix, path));
        }
    }

    #[cfg(test)]
    pub fn fail_reads_from(&self, path: &str) {
        if let Ok(mut paths) = self.failing_reads.lock() {
            paths.push(object_key(&self.dir_prefix, path));
        }
    }

    #[cfg(test)]
    fn should_fail(&self, key: &str) -> bool {
        self.failing_paths
            .lock()
            .map(|paths| paths.iter().any(|p| p == key))
            .unwrap_or(false)
    }

    #[cfg(not(test))]
    fn should_fail(&self, _key: &str) -> bool {
        false
    }

    #[cfg(test)]
    fn should_fail_read(&self, key: &str) -> bool {
        self.failing_reads
            .lock()
            .map(|paths| paths.iter().any(|p| p == key))
            .unwrap_or(false)
    }

    #[cfg(not(test))]
    fn should_fail_read(&self, _key: &str) -> bool {
        false
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredObject>> {
        // A poisoned map still holds consistent objects; each insert is a single step.
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<(), StorageError> {
        self.record_call();
        let key = object_key(&self.dir_prefix, path);
        if self.should_fail(&key) {
            return Err(StorageError::Put {
                path: key,
                message: "injected write failure".to_string(),
            });
        }
        debug!("memory put {key} ({} bytes)", bytes.len());
        self.lock().insert(
            key,
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Bytes, StorageError> {
        self.record_call();
        let key = object_key(&self.dir_prefix, path);
        if self.should_fail_read(&key) {
            return Err(StorageError::Get {
                path: key,
                message: "injected read failure".to_string(),
            });
        }
        self.lock()
            .get(&key)
            .map(|o| o.bytes.clone())
            .ok_or(StorageError::NotFound(key))
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        self.record_call();
        let key = object_key(&self.dir_prefix, path);
        Ok(self.lock().contains_key(&key))
    }

    async fn presign(&self, path: &str, ttl: Duration) -> Result<String, StorageError> {
        self.record_call();
        let key = object_key(&self.dir_prefix, path);
        Ok(format!("memory://{key}?expires_in={}", ttl.as_secs()))
    }

    async fn delete(&self, path: &str) {
        self.record_call();
        let key = object_key(&self.dir_prefix, path);
        if self.lock().remove(&key).is_none() {
            warn!("memory delete: no object at {key}");
        }
    }

    fn public_url(&self, path: &str) -> String {
        join_url(&self.url_prefix, &object_key(&self.dir_prefix, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get_returns_bytes() {
        let store = MemoryArtifactStore::new("root/", "https://cdn.test");
        store
            .put("a/a.pdf", Bytes::from_static(b"%PDF"), "application/pdf")
            .await
            .unwrap();

        assert_eq!(store.get("a/a.pdf").await.unwrap(), Bytes::from_static(b"%PDF"));
        assert_eq!(store.object("a/a.pdf").unwrap().content_type, "application/pdf");
        assert_eq!(store.call_count(), 2);
    }

    #[tokio::test]
    async fn test_put_overwrites_without_versioning() {
        let store = MemoryArtifactStore::new("", "https://cdn.test");
        store.put("k/x", Bytes::from_static(b"one"), "text/plain").await.unwrap();
        store.put("k/x", Bytes::from_static(b"two"), "text/plain").await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("k/x").await.unwrap(), Bytes::from_static(b"two"));
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = MemoryArtifactStore::new("", "https://cdn.test");
        let err = store.get("nope").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_missing_is_silent() {
        let store = MemoryArtifactStore::new("", "https://cdn.test");
        store.delete("nope").await;
        assert!(!store.exists("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_presign_and_public_url_include_prefix() {
        let store = MemoryArtifactStore::new("profiles/", "https://cdn.test/");
        let url = store
            .presign("k/k.html", Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(url, "memory://profiles/k/k.html?expires_in=3600");
        assert_eq!(store.public_url("k/k.html"), "https://cdn.test/profiles/k/k.html");
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let store = MemoryArtifactStore::new("", "https://cdn.test");
        store.fail_writes_to("k/k.pdf");
        let err = store
            .put("k/k.pdf", Bytes::from_static(b"x"), "application/pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Put { .. }));
        assert!(store.object("k/k.pdf").is_none());
    }
}
