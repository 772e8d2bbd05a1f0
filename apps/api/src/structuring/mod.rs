//! Content Structurer: turns extracted resume text into bilingual profile YAML
//! via the hosted language model, delivered as a stream of text chunks.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use thiserror::Error;
use tracing::info;

pub mod aggregate;
pub mod prompts;

use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, RAW_OUTPUT_INSTRUCTION};
use crate::llm_client::{LlmClient, LlmError};
use prompts::{PLAIN_TEXT_SYSTEM, PROFILE_YAML_SYSTEM};

/// Structured output chunks in arrival order.
pub type ChunkStream = BoxStream<'static, Result<String, StructuringError>>;

#[derive(Debug, Error)]
pub enum StructuringError {
    #[error("language model request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("structured output stream failed: {0}")]
    Stream(String),

    #[error("structured output not complete after {0}s")]
    Timeout(u64),

    #[error("structured output exceeded {0} bytes")]
    OutputTooLarge(usize),

    #[error("language model returned no content")]
    EmptyOutput,

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<StructuringError> },
}

#[async_trait]
pub trait ContentStructurer: Send + Sync {
    /// Starts structuring `text`; every generated document must carry `canonical_link`.
    async fn structure(&self, text: &str, canonical_link: &str)
        -> Result<ChunkStream, StructuringError>;
}

pub struct LlmContentStructurer {
    llm: LlmClient,
}

impl LlmContentStructurer {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl ContentStructurer for LlmContentStructurer {
    async fn structure(
        &self,
        text: &str,
        canonical_link: &str,
    ) -> Result<ChunkStream, StructuringError> {
        let system = build_profile_system_prompt(canonical_link);
        info!(
            "Requesting profile YAML for {} characters of resume text",
            text.chars().count()
        );
        let stream = self.llm.stream(text, &system).await?;
        Ok(stream.map(|chunk| chunk.map_err(StructuringError::from)).boxed())
    }
}

/// Normalises raw resume text into clean plain text with a single blocking call.
pub async fn normalize_resume_text(llm: &LlmClient, text: &str) -> Result<String, StructuringError> {
    let system = format!("{PLAIN_TEXT_SYSTEM}\n{RAW_OUTPUT_INSTRUCTION}");
    Ok(llm.call_text(text, &system).await?)
}

fn build_profile_system_prompt(canonical_link: &str) -> String {
    PROFILE_YAML_SYSTEM
        .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
        .replace("{raw_output_instruction}", RAW_OUTPUT_INSTRUCTION)
        .replace("{resume_link}", canonical_link)
}
