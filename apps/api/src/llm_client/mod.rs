//! LLM Client: the single point of entry for all Claude API calls.
//!
//! No other module calls the Anthropic API directly. Blocking calls retry on
//! 429/5xx; streamed calls never retry here.
//!
//! Model: claude-sonnet-4-5 (hardcoded, not configurable)

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;
pub mod sse;

use sse::{SseDecoder, SseEvent};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all LLM calls.
/// This is intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 4096;
/// Two full YAML documents need far more room than a single reply.
const STREAM_MAX_TOKENS: u32 = 16000;
const MAX_RETRIES: u32 = 3;
const CALL_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Text deltas of a streamed completion, in arrival order.
pub type TextStream = BoxStream<'static, Result<String, LlmError>>;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("Stream error: {0}")]
    Stream(String),
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Payloads of the streaming Messages API that matter for text output.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamPayload {
    ContentBlockDelta { delta: Delta },
    MessageStop,
    Error { error: AnthropicErrorBody },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

enum StreamItem {
    Text(String),
    Stop,
    Skip,
}

/// The single LLM client used by all services.
/// Wraps the Anthropic Messages API with retry logic and a streaming mode.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?,
            api_key,
        })
    }

    /// Makes a raw call to the Claude API, returning the full response object.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
    pub async fn call(&self, prompt: &str, system: &str) -> Result<LlmResponse, LlmError> {
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
        };

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(ANTHROPIC_API_URL)
                .timeout(CALL_TIMEOUT)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                return Err(api_error(response).await);
            }

            let llm_response: LlmResponse = response.json().await?;

            debug!(
                "LLM call succeeded: input_tokens={}, output_tokens={}",
                llm_response.usage.input_tokens, llm_response.usage.output_tokens
            );

            return Ok(llm_response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }

    /// Convenience method that calls the LLM and returns its text with any code fences removed.
    pub async fn call_text(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        let response = self.call(prompt, system).await?;
        let text = response.text().ok_or(LlmError::EmptyContent)?;
        let text = strip_code_fences(text);
        if text.is_empty() {
            return Err(LlmError::EmptyContent);
        }
        Ok(text.to_string())
    }

    /// Opens a streamed completion and yields text deltas as they arrive.
    ///
    /// No retries happen here: a stream that fails midway cannot be resumed, so
    /// the caller decides whether to start over.
    pub async fn stream(&self, prompt: &str, system: &str) -> Result<TextStream, LlmError> {
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: STREAM_MAX_TOKENS,
            system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
            stream: true,
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error = api_error(response).await;
            warn!("LLM stream rejected: {error}");
            return Err(error);
        }

        debug!("LLM stream opened");
        Ok(decode_text_stream(Box::pin(response.bytes_stream())).boxed())
    }
}

async fn api_error(response: reqwest::Response) -> LlmError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    // Try to parse error message
    let message = serde_json::from_str::<AnthropicError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    LlmError::Api { status, message }
}

struct DecodeState<S> {
    inner: S,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, LlmError>>,
    stopped: bool,
    finished: bool,
}

/// Turns a raw SSE byte stream into text deltas. The stream ends after
/// `message_stop`; a body that ends without one is reported as an error.
fn decode_text_stream<S, E>(inner: S) -> impl Stream<Item = Result<String, LlmError>>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin + Send + 'static,
    E: Into<LlmError> + Send + 'static,
{
    let state = DecodeState {
        inner,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        stopped: false,
        finished: false,
    };

    futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                if item.is_err() {
                    st.pending.clear();
                    st.finished = true;
                }
                return Some((item, st));
            }
            if st.finished {
                return None;
            }

            match st.inner.next().await {
                Some(Ok(chunk)) => {
                    for event in st.decoder.push(&chunk) {
                        match interpret(&event) {
                            Ok(StreamItem::Text(text)) => st.pending.push_back(Ok(text)),
                            Ok(StreamItem::Stop) => {
                                st.stopped = true;
                                st.finished = true;
                                break;
                            }
                            Ok(StreamItem::Skip) => {}
                            Err(e) => {
                                st.pending.push_back(Err(e));
                                break;
                            }
                        }
                    }
                }
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(e.into()), st));
                }
                None => {
                    st.finished = true;
                    if !st.stopped {
                        st.pending.push_back(Err(LlmError::Stream(
                            "stream ended before message_stop".to_string(),
                        )));
                    }
                }
            }
        }
    })
}

fn interpret(event: &SseEvent) -> Result<StreamItem, LlmError> {
    let data = event.data.trim();
    if data.is_empty() || event.event.as_deref() == Some("ping") {
        return Ok(StreamItem::Skip);
    }
    match serde_json::from_str::<StreamPayload>(data)? {
        StreamPayload::ContentBlockDelta {
            delta: Delta::TextDelta { text },
        } => Ok(StreamItem::Text(text)),
        StreamPayload::ContentBlockDelta { .. } | StreamPayload::Other => Ok(StreamItem::Skip),
        StreamPayload::MessageStop => Ok(StreamItem::Stop),
        StreamPayload::Error { error } => Err(LlmError::Stream(error.message)),
    }
}

/// Strips a leading ```lang line and trailing ``` fence from LLM output.
fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string ("yaml", "text", ...) up to the first newline.
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sse(payloads: &[&str]) -> Vec<Result<Bytes, LlmError>> {
        payloads
            .iter()
            .map(|p| Ok(Bytes::from(format!("event: x\ndata: {p}\n\n"))))
            .collect()
    }

    fn delta(text: &str) -> String {
        serde_json::json!({
            "type": "content_block_delta",
            "index": 0,
            "delta": {"type": "text_delta", "text": text}
        })
        .to_string()
    }

    async fn collect(chunks: Vec<Result<Bytes, LlmError>>) -> Vec<Result<String, LlmError>> {
        decode_text_stream(futures::stream::iter(chunks))
            .collect()
            .await
    }

    #[test]
    fn test_strip_code_fences_with_lang_tag() {
        assert_eq!(strip_code_fences("```text\nJane Doe\n```"), "Jane Doe");
    }

    #[test]
    fn test_strip_code_fences_without_tag() {
        assert_eq!(strip_code_fences("```\nJane Doe\n```"), "Jane Doe");
    }

    #[test]
    fn test_strip_code_fences_no_fences() {
        assert_eq!(strip_code_fences("  Jane Doe \n"), "Jane Doe");
    }

    #[test]
    fn test_request_omits_stream_flag_when_false() {
        let body = AnthropicRequest {
            model: MODEL,
            max_tokens: 10,
            system: "s",
            messages: vec![],
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("stream").is_none());
    }

    #[tokio::test]
    async fn test_decode_yields_text_deltas_in_order() {
        let first = delta("name: Jane");
        let second = delta("\n---\n");
        let chunks = sse(&[
            r#"{"type":"message_start","message":{}}"#,
            first.as_str(),
            r#"{"type":"ping"}"#,
            second.as_str(),
            r#"{"type":"message_stop"}"#,
        ]);

        let items = collect(chunks).await;
        let texts: Vec<String> = items.into_iter().map(Result::unwrap).collect();
        assert_eq!(texts, vec!["name: Jane".to_string(), "\n---\n".to_string()]);
    }

    #[tokio::test]
    async fn test_decode_ignores_non_text_deltas() {
        let chunks = sse(&[
            r#"{"type":"content_block_delta","delta":{"type":"input_json_delta","partial_json":"{"}}"#,
            r#"{"type":"message_stop"}"#,
        ]);
        assert!(collect(chunks).await.is_empty());
    }

    #[tokio::test]
    async fn test_decode_error_event_terminates_stream() {
        let text = delta("partial");
        let chunks = sse(&[
            text.as_str(),
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
            delta("never seen").as_str(),
        ]);

        let items = collect(chunks).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "partial");
        assert!(matches!(&items[1], Err(LlmError::Stream(m)) if m == "Overloaded"));
    }

    #[tokio::test]
    async fn test_decode_truncated_stream_is_error() {
        let text = delta("half");
        let items = collect(sse(&[text.as_str()])).await;
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Err(LlmError::Stream(_))));
    }

    #[tokio::test]
    async fn test_decode_transport_error_is_forwarded() {
        let chunks = vec![Err(LlmError::Stream("connection reset".to_string()))];
        let items = collect(chunks).await;
        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }
}
