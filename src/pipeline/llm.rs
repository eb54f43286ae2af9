//! Text generation: the [`TextGenerator`] seam and its LLM implementation.
//!
//! The worker only ever sees the trait. [`LlmTextGenerator`] rasterises the
//! document through [`super::render`], attaches the pages as images and sends
//! them with a task-specific prompt from [`crate::prompts`]. Tests swap in a
//! scripted generator instead.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient and frequent under
//! load. Exponential backoff (`retry_backoff_ms * 2^attempt`) with a 500 ms
//! base and 3 retries waits 500 ms → 1 s → 2 s. Each attempt is bounded by
//! `api_timeout_secs`; a timed-out attempt counts as a failed one.

use super::encode::encode_pages;
use super::render::render_pdf_bytes;
use crate::config::GenerationConfig;
use crate::error::AssignmentError;
use crate::prompts::{body_prompt, OUTLINE_PROMPT, REFERENCES_PROMPT, SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// What the generator is asked to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationTask {
    /// Assignment body from the source document, `page_budget` pages long.
    Body,
    /// Table of contents of the composed body.
    Outline,
    /// References page for the composed body.
    References,
}

impl GenerationTask {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationTask::Body => "body",
            GenerationTask::Outline => "outline",
            GenerationTask::References => "references",
        }
    }

    /// User prompt for this task.
    pub fn prompt(self, page_budget: u8) -> String {
        match self {
            GenerationTask::Body => body_prompt(page_budget),
            GenerationTask::Outline => OUTLINE_PROMPT.to_string(),
            GenerationTask::References => REFERENCES_PROMPT.to_string(),
        }
    }
}

impl fmt::Display for GenerationTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Produces markdown text from a PDF document.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for `task` from `document` (PDF bytes).
    ///
    /// The returned text is raw model output; cleanup and page-budget
    /// enforcement happen in the caller.
    async fn generate(
        &self,
        document: &[u8],
        page_budget: u8,
        task: GenerationTask,
    ) -> Result<String, AssignmentError>;
}

/// [`TextGenerator`] backed by an `edgequake-llm` vision provider.
///
/// The provider is resolved on first use so that a missing API key fails the
/// job that needed it rather than the process that built the service.
pub struct LlmTextGenerator {
    config: Arc<GenerationConfig>,
    provider: OnceCell<Arc<dyn LLMProvider>>,
}

impl LlmTextGenerator {
    pub fn new(config: Arc<GenerationConfig>) -> Self {
        Self {
            config,
            provider: OnceCell::new(),
        }
    }

    async fn provider(&self) -> Result<&Arc<dyn LLMProvider>, AssignmentError> {
        self.provider
            .get_or_try_init(|| async { resolve_provider(&self.config) })
            .await
    }

    async fn chat_with_retry(
        &self,
        provider: &Arc<dyn LLMProvider>,
        task: GenerationTask,
        messages: &[ChatMessage],
    ) -> Result<String, AssignmentError> {
        let config = &self.config;
        let options = build_options(config);
        let per_call = Duration::from_secs(config.api_timeout_secs);
        let start = Instant::now();
        let mut last_err: Option<String> = None;

        for attempt in 0..=config.max_retries {
            if attempt > 0 {
                let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    task, attempt, config.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match timeout(per_call, provider.chat(messages, Some(&options))).await {
                Ok(Ok(response)) => {
                    debug!(
                        "{}: {} input tokens, {} output tokens, {:?}",
                        task,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    if response.content.trim().is_empty() {
                        warn!("{}: attempt {} returned empty content", task, attempt + 1);
                        last_err = Some("empty completion".to_string());
                        continue;
                    }
                    return Ok(response.content);
                }
                Ok(Err(e)) => {
                    warn!("{}: attempt {} failed: {}", task, attempt + 1, e);
                    last_err = Some(e.to_string());
                }
                Err(_) => {
                    warn!(
                        "{}: attempt {} timed out after {}s",
                        task,
                        attempt + 1,
                        config.api_timeout_secs
                    );
                    last_err = Some(format!("timed out after {}s", config.api_timeout_secs));
                }
            }
        }

        Err(AssignmentError::upstream(
            task.as_str(),
            format!(
                "gave up after {} attempt(s): {}",
                config.max_retries + 1,
                last_err.unwrap_or_else(|| "unknown error".to_string())
            ),
        ))
    }
}

#[async_trait]
impl TextGenerator for LlmTextGenerator {
    async fn generate(
        &self,
        document: &[u8],
        page_budget: u8,
        task: GenerationTask,
    ) -> Result<String, AssignmentError> {
        let provider = self.provider().await?;

        let config = &self.config;
        let images = render_pdf_bytes(
            document.to_vec(),
            config.dpi,
            config.max_rendered_pixels,
            config.max_source_pages,
        )
        .await?;
        let encoded = encode_pages(&images)
            .map_err(|e| AssignmentError::Internal(format!("page encoding failed: {}", e)))?;
        info!("{}: sending {} page image(s) to the model", task, encoded.len());

        let messages = build_messages(task, page_budget, encoded);
        self.chat_with_retry(provider, task, &messages).await
    }
}

/// Message layout: the shared system prompt, then one user turn holding the
/// task prompt and every page image.
fn build_messages(task: GenerationTask, page_budget: u8, images: Vec<ImageData>) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user_with_images(task.prompt(page_budget), images),
    ]
}

fn build_options(config: &GenerationConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

const DEFAULT_MODEL: &str = "gpt-4.1-mini";

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, AssignmentError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        AssignmentError::upstream(
            "provider",
            format!("provider '{}' is not configured: {}", provider_name, e),
        )
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with `config.model`.
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Auto-detection** through [`ProviderFactory::from_env`].
pub fn resolve_provider(config: &GenerationConfig) -> Result<Arc<dyn LLMProvider>, AssignmentError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        if !key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) = ProviderFactory::from_env().map_err(|e| {
        AssignmentError::upstream(
            "provider",
            format!(
                "no LLM provider could be auto-detected; set OPENAI_API_KEY, \
                 ANTHROPIC_API_KEY, or configure a provider ({})",
                e
            ),
        )
    })?;
    Ok(llm_provider)
}
