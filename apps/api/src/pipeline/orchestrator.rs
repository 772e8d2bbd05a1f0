//! Profile Pipeline Orchestrator: runs one resume through every stage.
//!
//! Flow: validate key → validate media type → persist PDF → extract text →
//!       compute canonical link → structure (streamed, bounded retry) → split →
//!       persist content documents → render → persist HTML → presign URL.
//!
//! Stages form a strict chain; nothing runs in parallel within a request.
//! Concurrent runs for different keys share nothing but the artifact store.
//! Concurrent runs for the SAME key are not coordinated: the last write wins
//! at every artifact path.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::Utc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::PipelineSettings;
use crate::errors::AppError;
use crate::extraction::{ExtractionError, TextExtractor};
use crate::models::{
    ContentDocument, PipelineResult, ProfileKey, SourceDocument, SplitMode, StageTiming,
};
use crate::pipeline::splitter::{split, SplitOutcome};
use crate::rendering::{read_rendered_output, RenderError, RenderRequest, SiteRenderer};
use crate::storage::layout::{self, HTML_CONTENT_TYPE, PDF_CONTENT_TYPE, YAML_CONTENT_TYPE};
use crate::storage::ArtifactStore;
use crate::structuring::aggregate::{collect_chunks, AggregationLimits, MAX_STRUCTURED_BYTES};
use crate::structuring::{ContentStructurer, StructuringError};

/// Validity of the returned HTML download URL.
pub const HTML_URL_TTL: Duration = Duration::from_secs(3600);

#[derive(Clone)]
pub struct ProfilePipeline {
    store: Arc<dyn ArtifactStore>,
    extractor: Arc<dyn TextExtractor>,
    structurer: Arc<dyn ContentStructurer>,
    renderer: Arc<dyn SiteRenderer>,
    settings: PipelineSettings,
}

/// Records how long each stage took, in order.
struct StageTimer {
    timings: Vec<StageTiming>,
}

impl StageTimer {
    fn new() -> Self {
        Self {
            timings: Vec::new(),
        }
    }

    async fn time<T, E, F>(&mut self, stage: &'static str, fut: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        info!("Stage {stage} started");
        let started = Instant::now();
        let result = fut.await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => info!("Stage {stage} finished in {elapsed_ms}ms"),
            Err(e) => error!("Stage {stage} failed after {elapsed_ms}ms: {e}"),
        }
        self.timings.push(StageTiming { stage, elapsed_ms });
        result
    }
}

impl ProfilePipeline {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        extractor: Arc<dyn TextExtractor>,
        structurer: Arc<dyn ContentStructurer>,
        renderer: Arc<dyn SiteRenderer>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            extractor,
            structurer,
            renderer,
            settings,
        }
    }

    /// Runs the full pipeline for `key`.
    ///
    /// Re-running an existing key replaces every artifact under it. A failure
    /// after partial persistence leaves the written artifacts in place.
    /// Validation failures return before any storage call.
    pub async fn run(&self, key: &str, document: SourceDocument) -> Result<PipelineResult, AppError> {
        let started = Instant::now();

        let key = ProfileKey::parse(key)?;
        if !document.has_supported_media_type() {
            return Err(AppError::UnsupportedMediaType(format!(
                "only PDF documents are supported, got '{}'",
                document.media_type
            )));
        }
        if document.bytes.is_empty() {
            return Err(AppError::InvalidInput("document is empty".to_string()));
        }

        let span = info_span!("profile_pipeline", key = %key, run_id = %Uuid::new_v4());
        let deadline = self.settings.request_timeout;

        match tokio::time::timeout(deadline, self.run_stages(&key, document, started))
            .instrument(span)
            .await
        {
            Ok(result) => result,
            Err(_) => Err(AppError::Internal(anyhow::anyhow!(
                "request deadline of {}s exceeded for key '{key}'",
                deadline.as_secs()
            ))),
        }
    }

    async fn run_stages(
        &self,
        key: &ProfileKey,
        document: SourceDocument,
        started: Instant,
    ) -> Result<PipelineResult, AppError> {
        let mut timer = StageTimer::new();
        info!(
            "Starting profile pipeline ({} bytes, file {:?})",
            document.bytes.len(),
            document.filename
        );

        let source_path = layout::source_document_path(key);
        timer
            .time(
                "persist_source",
                self.store.put(&source_path, document.bytes, PDF_CONTENT_TYPE),
            )
            .await?;

        let text = timer.time("extract", self.extract(&source_path)).await?;

        let html_path = layout::html_path(key);
        let canonical_link = self.store.public_url(&html_path);

        let raw = timer
            .time("structure", self.structure_with_retry(&text, &canonical_link))
            .await?;

        let outcome = split(&raw);
        if outcome.mode() == SplitMode::Fallback {
            warn!("Structured output has no separator line; persisting a single fallback document");
        }

        let config_files = timer
            .time("persist_content", self.persist_content(key, &outcome))
            .await?;

        let html = timer.time("render", self.render(key, &outcome)).await?;

        timer
            .time(
                "persist_html",
                self.store.put(&html_path, Bytes::from(html), HTML_CONTENT_TYPE),
            )
            .await?;

        let html_url = timer
            .time("presign", self.store.presign(&html_path, HTML_URL_TTL))
            .await?;

        let processing_time_ms = started.elapsed().as_millis() as u64;
        info!("Profile pipeline finished in {processing_time_ms}ms");

        let message = match outcome.mode() {
            SplitMode::Bilingual => {
                "Profile configuration generated; the HTML file can be downloaded from html_url"
            }
            SplitMode::Fallback => {
                "Profile generated from a single configuration document; the HTML file can be downloaded from html_url"
            }
        };

        Ok(PipelineResult {
            success: true,
            message: message.to_string(),
            processing_time_ms,
            mode: outcome.mode(),
            config_files,
            html_path,
            html_url,
            html_url_expires_in: HTML_URL_TTL.as_secs(),
            html_url_expires_at: Utc::now() + chrono::Duration::seconds(HTML_URL_TTL.as_secs() as i64),
            stage_timings: timer.timings,
        })
    }

    /// Extraction is not retried: an unreadable document stays unreadable.
    async fn extract(&self, source_path: &str) -> Result<String, ExtractionError> {
        let limit = self.settings.extraction_timeout;
        let text = tokio::time::timeout(limit, self.extractor.extract(source_path))
            .await
            .map_err(|_| ExtractionError::Timeout(limit.as_secs()))??;

        if text.trim().is_empty() {
            return Err(ExtractionError::Empty);
        }
        info!("Extracted {} characters of resume text", text.chars().count());
        Ok(text)
    }

    async fn structure_with_retry(
        &self,
        text: &str,
        canonical_link: &str,
    ) -> Result<String, StructuringError> {
        let attempts = self.settings.structuring_max_retries.saturating_add(1);
        let mut last_error: Option<StructuringError> = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                let delay = retry_delay(self.settings.retry_backoff, attempt - 1);
                warn!(
                    "Structuring attempt {}/{} failed, retrying after {}ms...",
                    attempt - 1,
                    attempts,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            // Each attempt aggregates into a fresh buffer.
            match self.structure_once(text, canonical_link).await {
                Ok(output) => {
                    info!(
                        "Structured output received on attempt {attempt}: {} bytes",
                        output.len()
                    );
                    return Ok(output);
                }
                Err(e) => {
                    warn!("Structuring attempt {attempt}/{attempts} failed: {e}");
                    last_error = Some(e);
                }
            }
        }

        Err(StructuringError::Exhausted {
            attempts,
            last: Box::new(last_error.unwrap_or(StructuringError::EmptyOutput)),
        })
    }

    async fn structure_once(
        &self,
        text: &str,
        canonical_link: &str,
    ) -> Result<String, StructuringError> {
        let limits = AggregationLimits {
            deadline: self.settings.structuring_timeout,
            max_bytes: MAX_STRUCTURED_BYTES,
        };

        // Opening the stream counts against the same per-attempt deadline.
        let output = tokio::time::timeout(limits.deadline, async {
            let stream = self.structurer.structure(text, canonical_link).await?;
            collect_chunks(stream, limits).await
        })
        .await
        .map_err(|_| StructuringError::Timeout(limits.deadline.as_secs()))??;

        if output.trim().is_empty() {
            return Err(StructuringError::EmptyOutput);
        }
        Ok(output)
    }

    async fn persist_content(
        &self,
        key: &ProfileKey,
        outcome: &SplitOutcome,
    ) -> Result<Vec<String>, AppError> {
        let mut paths = Vec::new();
        for document in outcome.documents() {
            let path = layout::content_document_path(key, document);
            self.store
                .put(
                    &path,
                    Bytes::from(document.body.clone().into_bytes()),
                    YAML_CONTENT_TYPE,
                )
                .await?;
            info!("Saved content document {path}");
            paths.push(path);
        }
        Ok(paths)
    }

    /// Materialises the content documents into a scratch directory, runs the
    /// renderer over it and returns the produced HTML. The directory is removed
    /// when this returns.
    async fn render(&self, key: &ProfileKey, outcome: &SplitOutcome) -> Result<Vec<u8>, AppError> {
        let workspace = tempfile::Builder::new()
            .prefix("profile-render-")
            .tempdir()
            .map_err(|e| anyhow::anyhow!("failed to create render workspace: {e}"))?;

        let content_dir = workspace.path().join("config");
        write_content_documents(&content_dir, &outcome.documents()).await?;

        let request = RenderRequest {
            content_dir,
            mode: outcome.mode(),
            output_path: workspace.path().join(format!("{key}.html")),
        };

        let result = self.renderer.render(&request).await?;
        if !result.succeeded() {
            return Err(RenderError::Failed {
                status: result.status,
                output: result.output,
            }
            .into());
        }

        Ok(read_rendered_output(&request.output_path).await?)
    }
}

/// Backoff before the `retry`-th retry (1-based): `base`, `2 * base`, ...
/// Saturates instead of overflowing for large retry counts.
fn retry_delay(base: Duration, retry: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
}

async fn write_content_documents(dir: &Path, documents: &[&ContentDocument]) -> Result<(), AppError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| anyhow::anyhow!("failed to create {}: {e}", dir.display()))?;
    for document in documents {
        let path = dir.join(document.file_name());
        tokio::fs::write(&path, document.body.as_bytes())
            .await
            .map_err(|e| anyhow::anyhow!("failed to write {}: {e}", path.display()))?;
    }
    Ok(())
}
