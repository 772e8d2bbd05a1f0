use std::sync::Arc;

use crate::config::PipelineSettings;
use crate::llm_client::LlmClient;
use crate::pipeline::ProfilePipeline;
use crate::storage::ArtifactStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: ProfilePipeline,
    /// Same store the pipeline writes to; used by the artifact lookup and delete routes.
    pub store: Arc<dyn ArtifactStore>,
    pub llm: LlmClient,
    pub settings: PipelineSettings,
}
