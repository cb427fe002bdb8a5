//! Model interaction: send a prompt, get raw text back.
//!
//! The service only needs "text in, text out", so the seam is the small
//! [`ModelInvoker`] trait. [`EdgequakeModel`] implements it over any
//! edgequake-llm provider; tests substitute a scripted model. All prompt
//! wording lives in [`crate::prompts`].
//!
//! ## Timeout and retry
//!
//! Each attempt is bounded by `api_timeout_secs` so a hung provider cannot
//! hold a request open forever. Failures and timeouts are retried with
//! exponential backoff (`retry_backoff_ms * 2^attempt`): with 500 ms base and
//! 2 retries the waits are 500 ms → 1 s.

use crate::config::StudyConfig;
use crate::error::StudyError;
use crate::pipeline::encode::encode_attachment;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// A file sent along with the prompt.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Everything needed for one model call.
#[derive(Debug, Clone)]
pub struct ModelPrompt {
    pub system: String,
    pub user: String,
    pub attachment: Option<Attachment>,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// Raw model output for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReply {
    pub content: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

/// Failure of a single model attempt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InvokeError {
    #[error("model call timed out after {0}s")]
    Timeout(u64),
    #[error("{0}")]
    Provider(String),
}

/// Text-in, text-out access to a generative model.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// Label for logs and the health endpoint.
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &ModelPrompt) -> Result<ModelReply, InvokeError>;
}

/// [`ModelInvoker`] backed by an edgequake-llm provider.
pub struct EdgequakeModel {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl EdgequakeModel {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }

    /// Build from configuration, resolving the provider.
    pub fn from_config(config: &StudyConfig) -> Result<Self, StudyError> {
        let (provider, label) = resolve_provider(config)?;
        info!("Using model provider: {}", label);
        Ok(Self::new(provider, label))
    }
}

#[async_trait]
impl ModelInvoker for EdgequakeModel {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(&self, prompt: &ModelPrompt) -> Result<ModelReply, InvokeError> {
        let mut messages = vec![ChatMessage::system(prompt.system.as_str())];
        match &prompt.attachment {
            Some(file) => messages.push(ChatMessage::user_with_images(
                prompt.user.as_str(),
                vec![encode_attachment(&file.bytes, &file.content_type)],
            )),
            None => messages.push(ChatMessage::user(prompt.user.as_str())),
        }

        let options = CompletionOptions {
            temperature: Some(prompt.temperature),
            max_tokens: Some(prompt.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| InvokeError::Provider(e.to_string()))?;

        Ok(ModelReply {
            content: response.content,
            prompt_tokens: response.prompt_tokens,
            completion_tokens: response.completion_tokens,
        })
    }
}

/// A successful call and how many attempts it took.
#[derive(Debug, Clone)]
pub struct InvokeOutcome {
    pub reply: ModelReply,
    pub attempts: u32,
}

/// Call the model with a per-attempt timeout and exponential backoff.
///
/// The last failure decides the error: a timeout becomes
/// [`StudyError::ModelTimeout`], anything else
/// [`StudyError::ModelUnavailable`]. Both are retryable for the client.
pub async fn invoke(
    model: &dyn ModelInvoker,
    prompt: &ModelPrompt,
    config: &StudyConfig,
) -> Result<InvokeOutcome, StudyError> {
    let limit = Duration::from_secs(config.api_timeout_secs);
    let mut last_err: Option<InvokeError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config
                .retry_backoff_ms
                .saturating_mul(1u64 << (attempt - 1).min(16));
            warn!(
                "Model {}: retry {}/{} after {}ms",
                model.name(),
                attempt,
                config.max_retries,
                backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match timeout(limit, model.complete(prompt)).await {
            Ok(Ok(reply)) => {
                debug!(
                    "Model {}: {} input tokens, {} output tokens",
                    model.name(),
                    reply.prompt_tokens,
                    reply.completion_tokens
                );
                return Ok(InvokeOutcome {
                    reply,
                    attempts: attempt + 1,
                });
            }
            Ok(Err(e)) => {
                warn!("Model {}: attempt {} failed — {}", model.name(), attempt + 1, e);
                last_err = Some(e);
            }
            Err(_) => {
                warn!(
                    "Model {}: attempt {} timed out after {}s",
                    model.name(),
                    attempt + 1,
                    config.api_timeout_secs
                );
                last_err = Some(InvokeError::Timeout(config.api_timeout_secs));
            }
        }
    }

    let attempts = config.max_retries + 1;
    Err(match last_err {
        Some(InvokeError::Timeout(secs)) => StudyError::ModelTimeout { secs, attempts },
        Some(InvokeError::Provider(detail)) => StudyError::ModelUnavailable { attempts, detail },
        None => StudyError::Internal("model was never called".into()),
    })
}

// ── Provider resolution ──────────────────────────────────────────────────

const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, StudyError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        StudyError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`).
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **Gemini** when `GEMINI_API_KEY` is set; it reads PDFs natively.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
///
/// Returns the provider and a label for logs.
fn resolve_provider(config: &StudyConfig) -> Result<(Arc<dyn LLMProvider>, String), StudyError> {
    if let Some(ref provider) = config.provider {
        return Ok((Arc::clone(provider), config.model_label().to_string()));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
        return Ok((create_provider(name, model)?, format!("{name}/{model}")));
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return Ok((create_provider(&prov, &model)?, format!("{prov}/{model}")));
        }
    }

    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        if !key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
            return Ok((create_provider("gemini", model)?, format!("gemini/{model}")));
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| StudyError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY or ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok((llm_provider, config.model_label().to_string()))
}
