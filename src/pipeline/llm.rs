//! Vision AI interaction: send one unit image with a prompt, get text back.
//!
//! [`VisionClient`] is the seam between the pipeline and the AI service.
//! Production code uses [`LlmVisionClient`], a thin wrapper over an
//! edgequake-llm provider; tests substitute a scripted client.
//!
//! Each unit gets exactly one attempt bounded by `api_timeout_secs`. A
//! failure is recorded on the unit and the batch moves on.

use crate::config::ExtractionConfig;
use crate::error::UnitError;
use crate::output::UnitResult;
use crate::record::Record;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::debug;

/// Text returned by the model for one unit, with token accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisionReply {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl VisionReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// A unit ready to send. `image` already holds the failure when the unit
/// could not be read, rendered or encoded.
#[derive(Clone)]
pub struct UnitInput {
    pub unit: usize,
    pub label: String,
    pub image: Result<ImageData, UnitError>,
}

/// Turns a reply into rows, or fails the unit.
pub type ReplyParser = fn(usize, &str) -> Result<Vec<Record>, UnitError>;

/// A multimodal model that answers a prompt about one image.
pub trait VisionClient: Send + Sync {
    fn describe(
        &self,
        unit: usize,
        prompt: &str,
        image: ImageData,
    ) -> impl Future<Output = Result<VisionReply, UnitError>> + Send;
}

/// [`VisionClient`] backed by an edgequake-llm provider.
pub struct LlmVisionClient {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmVisionClient {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
        }
    }
}

impl VisionClient for LlmVisionClient {
    async fn describe(
        &self,
        unit: usize,
        prompt: &str,
        image: ImageData,
    ) -> Result<VisionReply, UnitError> {
        // The prompt and the image travel together in a single user turn.
        let messages = vec![ChatMessage::user_with_images(prompt, vec![image])];

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| UnitError::LlmFailed {
                unit,
                detail: e.to_string(),
            })?;

        Ok(VisionReply {
            text: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

/// Send one unit and parse the reply. Never fails: problems end up in
/// [`UnitResult::error`].
pub async fn process_unit<C: VisionClient>(
    client: &C,
    unit: usize,
    label: &str,
    prompt: &str,
    image: ImageData,
    parse: ReplyParser,
    config: &ExtractionConfig,
) -> UnitResult {
    let start = Instant::now();
    let secs = config.api_timeout_secs;

    let outcome = match timeout(
        Duration::from_secs(secs),
        client.describe(unit, prompt, image),
    )
    .await
    {
        Ok(reply) => reply,
        Err(_) => Err(UnitError::Timeout { unit, secs }),
    };

    let mut result = match outcome {
        Ok(reply) => {
            debug!(
                "Unit {}: {} input tokens, {} output tokens",
                unit, reply.input_tokens, reply.output_tokens
            );
            let mut result = match parse(unit, &reply.text) {
                Ok(records) => UnitResult::success(unit, label, records),
                Err(e) => UnitResult::failure(unit, label, e),
            };
            result.input_tokens = reply.input_tokens;
            result.output_tokens = reply.output_tokens;
            result
        }
        Err(e) => UnitResult::failure(unit, label, e),
    };

    result.duration_ms = start.elapsed().as_millis() as u64;
    result
}

fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
