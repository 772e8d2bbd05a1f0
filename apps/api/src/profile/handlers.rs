use std::time::Instant;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::errors::AppError;
use crate::extraction::{extract_pdf_text, ExtractionError};
use crate::models::{PipelineResult, ProfileKey, SourceDocument};
use crate::pipeline::HTML_URL_TTL;
use crate::state::AppState;
use crate::storage::{layout, StorageError};
use crate::structuring::normalize_resume_text;

/// Fields read from a multipart upload.
#[derive(Debug, Default)]
struct UploadForm {
    key: Option<String>,
    file: Option<SourceDocument>,
}

async fn read_upload(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("key") => {
                let key = field
                    .text()
                    .await
                    .map_err(|e| AppError::InvalidInput(format!("unreadable key field: {e}")))?;
                form.key = Some(key.trim().to_string());
            }
            Some("file") => {
                let filename = field.file_name().map(str::to_string);
                let media_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::InvalidInput(format!("unreadable file field: {e}")))?;

                info!(
                    "Received upload: file={:?} size={} content_type={:?}",
                    filename,
                    bytes.len(),
                    media_type
                );

                let mut document = SourceDocument::new(bytes, media_type);
                if let Some(filename) = filename {
                    document = document.with_filename(filename);
                }
                form.file = Some(document);
            }
            _ => {}
        }
    }

    Ok(form)
}

/// POST /api/v1/resume/generate-profile
///
/// Concurrent uploads for the same key are not serialised; the last write
/// wins for each artifact.
pub async fn handle_generate_profile(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PipelineResult>, AppError> {
    let form = read_upload(multipart).await?;
    let key = form
        .key
        .ok_or_else(|| AppError::InvalidInput("missing form field 'key'".to_string()))?;
    let document = form
        .file
        .ok_or_else(|| AppError::InvalidInput("missing form field 'file'".to_string()))?;

    let result = state.pipeline.run(&key, document).await?;
    Ok(Json(result))
}

#[derive(Serialize)]
pub struct ResumeTextResponse {
    pub success: bool,
    pub content: String,
    pub processing_time_ms: u64,
}

/// POST /api/v1/resume/to-text
///
/// Extracts and normalises resume text without persisting anything.
pub async fn handle_resume_to_text(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ResumeTextResponse>, AppError> {
    let started = Instant::now();
    let document = read_upload(multipart)
        .await?
        .file
        .ok_or_else(|| AppError::InvalidInput("missing form field 'file'".to_string()))?;

    if !document.has_supported_media_type() {
        return Err(AppError::UnsupportedMediaType(format!(
            "only PDF documents are supported, got '{}'",
            document.media_type
        )));
    }
    if document.bytes.is_empty() {
        return Err(AppError::InvalidInput("document is empty".to_string()));
    }

    let limit = state.settings.extraction_timeout;
    let text = tokio::time::timeout(limit, extract_pdf_text(document.bytes.to_vec()))
        .await
        .map_err(|_| ExtractionError::Timeout(limit.as_secs()))??;

    let content = normalize_resume_text(&state.llm, &text).await?;

    Ok(Json(ResumeTextResponse {
        success: true,
        content,
        processing_time_ms: started.elapsed().as_millis() as u64,
    }))
}

#[derive(Serialize)]
pub struct HtmlUrlResponse {
    pub success: bool,
    pub html_path: String,
    pub html_url: String,
    pub html_url_expires_in: u64,
    pub html_url_expires_at: DateTime<Utc>,
}

/// GET /api/v1/profiles/:key/html-url
pub async fn handle_get_html_url(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<HtmlUrlResponse>, AppError> {
    let key = ProfileKey::parse(&key)?;
    let html_path = layout::html_path(&key);

    if !state.store.exists(&html_path).await? {
        return Err(StorageError::NotFound(html_path).into());
    }

    let html_url = state.store.presign(&html_path, HTML_URL_TTL).await?;
    Ok(Json(HtmlUrlResponse {
        success: true,
        html_path,
        html_url,
        html_url_expires_in: HTML_URL_TTL.as_secs(),
        html_url_expires_at: Utc::now() + chrono::Duration::seconds(HTML_URL_TTL.as_secs() as i64),
    }))
}

/// DELETE /api/v1/profiles/:key
pub async fn handle_delete_profile(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<StatusCode, AppError> {
    let key = ProfileKey::parse(&key)?;
    for path in layout::all_artifact_paths(&key) {
        state.store.delete(&path).await;
    }
    info!("Deleted artifacts for key '{key}'");
    Ok(StatusCode::NO_CONTENT)
}
