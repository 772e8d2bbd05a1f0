//! Artifact Store Adapter: durable, path-addressable blob storage.
//!
//! Every artifact a pipeline run produces goes through [`ArtifactStore`].
//! Callers pass paths relative to the store root (see [`layout`]); each backend
//! prepends its configured directory prefix. Writes overwrite without versioning,
//! and each `put` is atomic per object only.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub mod layout;
pub mod memory;
pub mod s3;

pub use memory::MemoryArtifactStore;
pub use s3::S3ArtifactStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("failed to write '{path}': {message}")]
    Put { path: String, message: String },

    #[error("failed to read '{path}': {message}")]
    Get { path: String, message: String },

    #[error("failed to stat '{path}': {message}")]
    Head { path: String, message: String },

    #[error("failed to presign '{path}': {message}")]
    Presign { path: String, message: String },
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Writes `bytes` at `path`, replacing any existing object.
    async fn put(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<(), StorageError>;

    async fn get(&self, path: &str) -> Result<Bytes, StorageError>;

    async fn exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Returns a time-limited read URL for `path`.
    async fn presign(&self, path: &str, ttl: Duration) -> Result<String, StorageError>;

    /// Best-effort removal. Failures are logged by the backend, never returned.
    async fn delete(&self, path: &str);

    /// Stable public URL of `path`, independent of any presigning.
    fn public_url(&self, path: &str) -> String;
}

/// Joins the configured root prefix and a relative artifact path into an object key.
pub(crate) fn object_key(dir_prefix: &str, path: &str) -> String {
    let path = path.trim_start_matches('/');
    if dir_prefix.is_empty() {
        return path.to_string();
    }
    if dir_prefix.ends_with('/') {
        format!("{dir_prefix}{path}")
    } else {
        format!("{dir_prefix}/{path}")
    }
}

/// Joins a URL prefix and an object key with exactly one slash between them.
pub(crate) fn join_url(url_prefix: &str, key: &str) -> String {
    format!(
        "{}/{}",
        url_prefix.trim_end_matches('/'),
        key.trim_start_matches('/')
    )
}
