//! Text Extractor: turns a stored PDF into page-ordered plain text.
//!
//! Extraction reads the document back from the artifact store rather than from
//! the upload, so it only depends on the persisted copy.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::storage::{ArtifactStore, StorageError};

/// Page separator emitted by `pdf-extract` between pages.
const PAGE_BREAK: char = '\u{000C}';

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("could not fetch document: {0}")]
    Fetch(#[from] StorageError),

    #[error("could not parse PDF: {0}")]
    Parse(String),

    #[error("document contains no extractable text")]
    Empty,

    #[error("extraction timed out after {0}s")]
    Timeout(u64),
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extracts text from the document stored at `document_path`.
    async fn extract(&self, document_path: &str) -> Result<String, ExtractionError>;
}

pub struct PdfTextExtractor {
    store: Arc<dyn ArtifactStore>,
}

impl PdfTextExtractor {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(&self, document_path: &str) -> Result<String, ExtractionError> {
        let bytes = self.store.get(document_path).await?;
        info!("Extracting text from {document_path} ({} bytes)", bytes.len());
        extract_pdf_text(bytes.to_vec()).await
    }
}

/// Parses PDF bytes on the blocking pool and returns normalised text.
/// `pdf-extract` may panic on malformed input; the panic surfaces as a parse error.
pub async fn extract_pdf_text(bytes: Vec<u8>) -> Result<String, ExtractionError> {
    let raw = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| ExtractionError::Parse(format!("extractor task failed: {e}")))?
        .map_err(|e| ExtractionError::Parse(e.to_string()))?;

    let text = join_pages(&raw);
    if text.is_empty() {
        return Err(ExtractionError::Empty);
    }
    info!("Extracted {} characters", text.chars().count());
    Ok(text)
}

/// Splits raw extractor output into pages, trims each, drops blank pages and
/// joins the rest with newlines.
fn join_pages(raw: &str) -> String {
    raw.split(PAGE_BREAK)
        .map(str::trim)
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
