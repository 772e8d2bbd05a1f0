use std::fmt;

use bytes::Bytes;
use serde::Serialize;

use crate::errors::AppError;

/// The only document type the pipeline accepts.
pub const SUPPORTED_MEDIA_TYPE: &str = "application/pdf";

/// Caller-chosen namespace identifier for one profile's artifacts.
///
/// Always non-empty and restricted to `[A-Za-z0-9_-]`, so it is safe to use
/// as a path segment in object keys and on the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ProfileKey(String);

impl ProfileKey {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        if raw.is_empty() {
            return Err(AppError::InvalidInput("key cannot be empty".to_string()));
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(AppError::InvalidInput(
                "key may only contain letters, digits, underscores and hyphens".to_string(),
            ));
        }
        Ok(Self(raw.to_string()))
    }
}

impl fmt::Display for ProfileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An uploaded resume: raw bytes plus the declared media type.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub bytes: Bytes,
    pub media_type: String,
    /// Informational only; never used to build paths.
    pub filename: Option<String>,
}

impl SourceDocument {
    pub fn new(bytes: impl Into<Bytes>, media_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            media_type: media_type.into(),
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// True when the declared type's essence (parameters stripped) is exactly
    /// `application/pdf`.
    pub fn has_supported_media_type(&self) -> bool {
        let essence = self
            .media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim();
        essence.eq_ignore_ascii_case(SUPPORTED_MEDIA_TYPE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Zh,
    En,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Zh => "zh",
            Language::En => "en",
        }
    }
}

/// One structured profile document (YAML text) as produced by the structurer.
/// `language` is `None` for the single fallback document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDocument {
    pub language: Option<Language>,
    pub body: String,
}

impl ContentDocument {
    pub fn new(language: Option<Language>, body: impl Into<String>) -> Self {
        Self {
            language,
            body: body.into(),
        }
    }

    /// File name the document is stored under inside the profile's config directory.
    pub fn file_name(&self) -> String {
        match self.language {
            Some(lang) => format!("{}.yaml", lang.code()),
            None => "config.yaml".to_string(),
        }
    }
}
