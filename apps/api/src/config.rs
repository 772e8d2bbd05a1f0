use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Which artifact store backend the service writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    S3,
    Memory,
}

/// Credentials and addressing for the S3-compatible object store.
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub bucket: String,
    pub endpoint: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub storage_backend: StorageBackend,
    /// Present only when `storage_backend` is `S3`.
    pub s3: Option<S3Settings>,
    pub storage_dir_prefix: String,
    pub storage_url_prefix: String,
    pub anthropic_api_key: String,
    pub renderer_program: String,
    pub renderer_script: String,
    pub renderer_workdir: PathBuf,
    pub structuring_max_retries: u32,
    pub request_timeout_secs: u64,
    pub extraction_timeout_secs: u64,
    pub structuring_timeout_secs: u64,
    pub render_timeout_secs: u64,
    pub max_upload_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

/// The subset of configuration the pipeline orchestrator needs.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub structuring_max_retries: u32,
    pub request_timeout: Duration,
    pub extraction_timeout: Duration,
    pub structuring_timeout: Duration,
    /// Base delay before the first structuring retry; doubles on each further retry.
    pub retry_backoff: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            structuring_max_retries: 1,
            request_timeout: Duration::from_secs(600),
            extraction_timeout: Duration::from_secs(60),
            structuring_timeout: Duration::from_secs(300),
            retry_backoff: Duration::from_secs(1),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let storage_backend = match optional_env("STORAGE_BACKEND", "s3").as_str() {
            "s3" => StorageBackend::S3,
            "memory" => StorageBackend::Memory,
            other => bail!("STORAGE_BACKEND must be 's3' or 'memory', got '{other}'"),
        };

        let s3 = match storage_backend {
            StorageBackend::S3 => Some(S3Settings {
                bucket: require_env("S3_BUCKET")?,
                endpoint: require_env("S3_ENDPOINT")?,
                region: optional_env("S3_REGION", "us-east-1"),
                access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
                secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            }),
            StorageBackend::Memory => None,
        };

        Ok(Config {
            storage_backend,
            s3,
            storage_dir_prefix: optional_env("STORAGE_DIR_PREFIX", ""),
            storage_url_prefix: require_env("STORAGE_URL_PREFIX")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            renderer_program: optional_env("RENDERER_PROGRAM", "node"),
            renderer_script: optional_env("RENDERER_SCRIPT", "build-standalone.js"),
            renderer_workdir: PathBuf::from(optional_env("RENDERER_WORKDIR", "./profile_website")),
            structuring_max_retries: parse_env("STRUCTURING_MAX_RETRIES", 1)?,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", 600)?,
            extraction_timeout_secs: parse_env("EXTRACTION_TIMEOUT_SECS", 60)?,
            structuring_timeout_secs: parse_env("STRUCTURING_TIMEOUT_SECS", 300)?,
            render_timeout_secs: parse_env("RENDER_TIMEOUT_SECS", 120)?,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            port: parse_env("PORT", 8080)?,
            rust_log: optional_env("RUST_LOG", "info"),
        })
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            structuring_max_retries: self.structuring_max_retries,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            extraction_timeout: Duration::from_secs(self.extraction_timeout_secs),
            structuring_timeout: Duration::from_secs(self.structuring_timeout_secs),
            ..PipelineSettings::default()
        }
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pipeline_settings_allow_one_retry() {
        let settings = PipelineSettings::default();
        assert_eq!(settings.structuring_max_retries, 1);
        assert!(settings.request_timeout > settings.structuring_timeout);
    }

    #[test]
    fn test_parse_env_falls_back_to_default_when_unset() {
        let value: u64 = parse_env("PROFILE_API_TEST_SURELY_UNSET_VAR", 42).unwrap();
        assert_eq!(value, 42);
    }
}
