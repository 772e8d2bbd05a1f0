use std::time::Duration;

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::{info, warn};

use super::{join_url, object_key, ArtifactStore, StorageError};
use crate::config::S3Settings;

/// Artifact store backed by any S3-compatible service (AWS, MinIO, OSS).
/// Stateless apart from its client and addressing; safe to share across requests.
#[derive(Clone)]
pub struct S3ArtifactStore {
    client: Client,
    bucket: String,
    dir_prefix: String,
    url_prefix: String,
}

impl S3ArtifactStore {
    /// Builds the S3 client from static credentials. Path-style addressing keeps
    /// MinIO and other self-hosted endpoints working.
    pub async fn connect(settings: &S3Settings, dir_prefix: &str, url_prefix: &str) -> Self {
        let credentials = Credentials::new(
            &settings.access_key_id,
            &settings.secret_access_key,
            None,
            None,
            "profile-api-static",
        );

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(&settings.endpoint)
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        info!(
            "S3 artifact store: bucket={} endpoint={} prefix='{}'",
            settings.bucket, settings.endpoint, dir_prefix
        );

        Self {
            client: Client::from_conf(s3_config),
            bucket: settings.bucket.clone(),
            dir_prefix: dir_prefix.to_string(),
            url_prefix: url_prefix.to_string(),
        }
    }

    fn key(&self, path: &str) -> String {
        object_key(&self.dir_prefix, path)
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn put(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<(), StorageError> {
        let key = self.key(path);
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::Put {
                path: key.clone(),
                message: e.to_string(),
            })?;

        info!("Uploaded {size} bytes to s3://{}/{}", self.bucket, key);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Bytes, StorageError> {
        let key = self.key(path);
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    StorageError::NotFound(key.clone())
                } else {
                    StorageError::Get {
                        path: key.clone(),
                        message: service_error.to_string(),
                    }
                }
            })?;

        let data = output.body.collect().await.map_err(|e| StorageError::Get {
            path: key.clone(),
            message: e.to_string(),
        })?;

        Ok(data.into_bytes())
    }

    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let key = self.key(path);
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(StorageError::Head {
                        path: key,
                        message: service_error.to_string(),
                    })
                }
            }
        }
    }

    async fn presign(&self, path: &str, ttl: Duration) -> Result<String, StorageError> {
        let key = self.key(path);
        let presigning = PresigningConfig::expires_in(ttl).map_err(|e| StorageError::Presign {
            path: key.clone(),
            message: e.to_string(),
        })?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Presign {
                path: key.clone(),
                message: e.to_string(),
            })?;

        Ok(request.uri().to_string())
    }

    async fn delete(&self, path: &str) {
        let key = self.key(path);
        match self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(_) => info!("Deleted s3://{}/{}", self.bucket, key),
            Err(e) => warn!("Failed to delete s3://{}/{}: {e}", self.bucket, key),
        }
    }

    fn public_url(&self, path: &str) -> String {
        join_url(&self.url_prefix, &self.key(path))
    }
}
