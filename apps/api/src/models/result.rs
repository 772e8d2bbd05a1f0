use chrono::{DateTime, Utc};
use serde::Serialize;

/// Whether the structurer honoured the bilingual separator convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitMode {
    Bilingual,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageTiming {
    pub stage: &'static str,
    pub elapsed_ms: u64,
}

/// The value returned to the caller for a successful run. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub success: bool,
    pub message: String,
    pub processing_time_ms: u64,
    pub mode: SplitMode,
    /// Relative storage paths of the persisted content documents.
    pub config_files: Vec<String>,
    pub html_path: String,
    pub html_url: String,
    pub html_url_expires_in: u64,
    pub html_url_expires_at: DateTime<Utc>,
    pub stage_timings: Vec<StageTiming>,
}
